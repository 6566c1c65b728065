use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue, LOCATION};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Limited};
use hyper::body::Bytes;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use metrics::Gauge;
use shared::gauge;
use shared::http::{full_body, make_error_response};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::bootstrap::{Bootstrap, Bootstrapper, LOGIN_PATH};
use crate::errors::{BootstrapError, Result};
use crate::headers::combine_headers;
use crate::honeypot::parse_form;
use crate::metrics_defs::REQUESTS_INFLIGHT;

type Body = BoxBody<Bytes, BootstrapError>;

const LOGOUT_PATH: &str = "/logout";
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Serves the bootstrap payload of the requested page as JSON, and the login and
/// logout form posts.
///
/// Pages under `/settings` require a session; the login page requires its absence.
pub struct BootstrapService {
    bootstrapper: Arc<Bootstrapper>,
}

impl BootstrapService {
    pub fn new(bootstrapper: Arc<Bootstrapper>) -> Self {
        Self { bootstrapper }
    }
}

impl<B> Service<Request<B>> for BootstrapService
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response<Body>;
    type Error = BootstrapError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let bootstrapper = self.bootstrapper.clone();

        Box::pin(async move {
            let _inflight = InflightGuard::new();
            let path = req.uri().path().to_owned();

            let response = match handle(&bootstrapper, req).await {
                Ok(response) => response,
                Err(BootstrapError::Unauthenticated { redirect_to }) => {
                    redirect(&redirect_to, &HeaderMap::new())
                }
                Err(BootstrapError::AlreadyAuthenticated) => redirect("/", &HeaderMap::new()),
                Err(e @ (BootstrapError::Honeypot(_) | BootstrapError::InvalidBody(_))) => {
                    tracing::warn!(error = %e, path, "Rejected form submission");
                    make_error_response(StatusCode::BAD_REQUEST)
                }
                Err(e) => {
                    tracing::error!(error = %e, path, "Bootstrap failed");
                    make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
                }
            };
            Ok(response)
        })
    }
}

/// Counts a request in `requests.inflight` for as long as it is alive, including
/// when the connection goes away and its future is dropped mid-request.
struct InflightGuard(Gauge);

impl InflightGuard {
    fn new() -> Self {
        let gauge = gauge!(REQUESTS_INFLIGHT);
        gauge.increment(1.0);
        Self(gauge)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.decrement(1.0);
    }
}

async fn handle<B>(bootstrapper: &Bootstrapper, req: Request<B>) -> Result<Response<Body>>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    match parts.uri.path() {
        LOGIN_PATH if parts.method == Method::POST => {
            let form = read_form(body).await?;
            Ok(found(bootstrapper.login(&parts.headers, &form).await?))
        }
        LOGOUT_PATH if parts.method == Method::POST => {
            Ok(found(bootstrapper.logout(&parts.headers).await?))
        }
        LOGIN_PATH => {
            bootstrapper
                .identity()
                .require_anonymous(&parts.headers)
                .await?;
            Ok(page_response(bootstrapper.bootstrap(&parts).await?))
        }
        path if requires_user(path) => {
            bootstrapper
                .identity()
                .require_user_id(&parts.headers, &parts.uri)
                .await?;
            Ok(page_response(bootstrapper.bootstrap(&parts).await?))
        }
        _ => Ok(page_response(bootstrapper.bootstrap(&parts).await?)),
    }
}

fn requires_user(path: &str) -> bool {
    path == "/settings" || path.starts_with("/settings/")
}

async fn read_form<B>(body: B) -> Result<HashMap<String, String>>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let collected = Limited::new(body, MAX_FORM_BYTES)
        .collect()
        .await
        .map_err(|e| BootstrapError::InvalidBody(e.to_string()))?;
    Ok(parse_form(&collected.to_bytes()))
}

fn page_response(bootstrap: Bootstrap) -> Response<Body> {
    if let Some(location) = &bootstrap.redirect_to {
        return redirect(location, &bootstrap.headers);
    }

    let json = match serde_json::to_vec(&bootstrap.payload) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize bootstrap payload");
            return make_error_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut content_type = HeaderMap::new();
    content_type.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut response = Response::new(full_body(json));
    *response.headers_mut() = combine_headers([Some(&content_type), Some(&bootstrap.headers)]);
    response
}

fn redirect(location: &str, headers: &HeaderMap) -> Response<Body> {
    let Ok(location) = HeaderValue::from_str(location) else {
        tracing::error!(location, "Invalid redirect location");
        return make_error_response(StatusCode::INTERNAL_SERVER_ERROR);
    };

    let mut target = HeaderMap::new();
    target.insert(LOCATION, location);
    found(combine_headers([Some(&target), Some(headers)]))
}

/// A 302 whose headers already carry `Location`.
fn found(headers: HeaderMap) -> Response<Body> {
    let mut response = Response::new(full_body(""));
    *response.status_mut() = StatusCode::FOUND;
    *response.headers_mut() = headers;
    response
}
