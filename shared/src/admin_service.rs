use crate::http::{full_body, make_error_response};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

type ReadinessCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Serves the liveness (`/health`) and readiness (`/ready`) probes on the admin listener.
pub struct AdminService<E> {
    is_ready: ReadinessCheck,
    _error: PhantomData<fn() -> E>,
}

impl<E> AdminService<E> {
    pub fn new<F>(is_ready: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            is_ready: Arc::new(is_ready),
            _error: PhantomData,
        }
    }
}

impl<B, E> Service<Request<B>> for AdminService<E>
where
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let is_ready = (self.is_ready)();
        let path = req.uri().path().to_owned();

        Box::pin(async move {
            let res = match path.as_str() {
                "/health" => Response::new(full_body("ok\n")),
                "/ready" if is_ready => Response::new(full_body("ok\n")),
                "/ready" => make_error_response(StatusCode::SERVICE_UNAVAILABLE),
                _ => make_error_response(StatusCode::NOT_FOUND),
            };
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn get(path: &str) -> Request<()> {
        Request::builder().uri(path).body(()).unwrap()
    }

    #[tokio::test]
    async fn test_probes() {
        let ready = Arc::new(AtomicBool::new(false));
        let flag = ready.clone();
        let admin = AdminService::<Infallible>::new(move || flag.load(Ordering::Relaxed));

        let res = admin.call(get("/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = admin.call(get("/ready")).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        ready.store(true, Ordering::Relaxed);
        let res = admin.call(get("/ready")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = admin.call(get("/nope")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
