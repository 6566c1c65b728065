//! The per-request bootstrap that runs before every page render.
//!
//! Identity resolution and honeypot issuance run concurrently against one
//! request-scoped [`Timings`] recorder. The toast cookie is consumed, the
//! remaining collaborators are read from the request, and the headers of
//! every collaborator are combined into one set for the response.

use http::header::{HeaderMap, HeaderValue, LOCATION};
use http::request::Parts;
use shared::histogram;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{Identity, IdentityResolver, SessionStore, UserStore};
use crate::client_hints;
use crate::config::Config;
use crate::cookies;
use crate::env::PublicEnv;
use crate::errors::Result;
use crate::headers::combine_headers;
use crate::honeypot::{Honeypot, HoneypotIssuer};
use crate::metrics_defs::BOOTSTRAP_DURATION;
use crate::payload::RootPayload;
use crate::request_info::{self, RequestInfo, UserPrefs};
use crate::signing::Signer;
use crate::theme;
use crate::timing::{SERVER_TIMING, Timings};
use crate::toast::{ToastChannel, ToastInput, ToastType};

pub const WAGMI_COOKIE: &str = "wagmi.store";

/// Where a request with an orphaned session is sent after its session is cleared.
const FORCED_LOGOUT_REDIRECT: &str = "/";

pub const LOGIN_PATH: &str = "/login";
const USERNAME_FIELD: &str = "username";
const REDIRECT_TO_FIELD: &str = "redirectTo";

/// Result of bootstrapping one request.
#[derive(Debug)]
pub struct Bootstrap {
    pub payload: RootPayload,
    /// `Server-Timing`, the toast-clearing cookie and, after a forced logout,
    /// the session-clearing cookie.
    pub headers: HeaderMap,
    /// Set when the response must be a redirect instead of a page.
    pub redirect_to: Option<String>,
}

pub struct Bootstrapper {
    identity: IdentityResolver,
    toasts: ToastChannel,
    honeypot: Arc<dyn HoneypotIssuer>,
    env: Arc<PublicEnv>,
}

impl Bootstrapper {
    pub fn new(
        identity: IdentityResolver,
        toasts: ToastChannel,
        honeypot: Arc<dyn HoneypotIssuer>,
        env: PublicEnv,
    ) -> Self {
        Self {
            identity,
            toasts,
            honeypot,
            env: Arc::new(env),
        }
    }

    /// Wires the toast channel and honeypot from configuration.
    pub fn from_config(
        config: &Config,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self> {
        config.validate()?;

        let toasts = ToastChannel::new(Signer::new(&config.secrets.toast), config.cookies.clone())?;
        let honeypot = Honeypot::new(Signer::new(&config.secrets.honeypot));
        let env = PublicEnv::new(config.mode.as_str(), config.public_env.clone());

        Ok(Self::new(
            IdentityResolver::new(sessions, users),
            toasts,
            Arc::new(honeypot),
            env,
        ))
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn toasts(&self) -> &ToastChannel {
        &self.toasts
    }

    /// Handles a submitted login form and returns the headers of the redirect that follows,
    /// `Location` included.
    ///
    /// Unknown usernames go back to the login page with an error toast.
    pub async fn login(
        &self,
        headers: &HeaderMap,
        form: &HashMap<String, String>,
    ) -> Result<HeaderMap> {
        self.identity.require_anonymous(headers).await?;
        self.honeypot.check(form)?;

        let username = form.get(USERNAME_FIELD).map(|u| u.trim()).unwrap_or_default();
        let redirect_to = form
            .get(REDIRECT_TO_FIELD)
            .map(String::as_str)
            .filter(|target| is_local_path(target))
            .unwrap_or("/");

        match self.identity.login(username).await? {
            Some((user, session_headers)) => {
                let welcome = ToastInput::new("Welcome back")
                    .description(format!("Logged in as {}", user.username))
                    .kind(ToastType::Success);
                let toast_headers = self.toasts.redirect_with_toast(redirect_to, welcome)?;
                Ok(combine_headers([Some(&toast_headers), Some(&session_headers)]))
            }
            None => {
                tracing::debug!(username, "Login attempt for unknown user");
                self.toasts.redirect_with_toast(
                    LOGIN_PATH,
                    ToastInput::new("Invalid username").kind(ToastType::Error),
                )
            }
        }
    }

    /// Ends the request's session and redirects home.
    pub async fn logout(&self, headers: &HeaderMap) -> Result<HeaderMap> {
        let mut cleared = self.identity.logout(headers).await?;
        cleared.insert(LOCATION, HeaderValue::from_static("/"));
        Ok(cleared)
    }

    pub async fn bootstrap(&self, parts: &Parts) -> Result<Bootstrap> {
        let started = Instant::now();
        let timings = Timings::with_root("root loader");
        let headers = &parts.headers;

        let (identity, honey_props) = tokio::join!(
            self.identity.resolve_user(headers, &timings),
            self.honeypot.input_props(),
        );

        let (user, session_headers, redirect_to) = match identity? {
            Identity::Anonymous => (None, None, None),
            Identity::Authenticated(principal) => (Some(principal), None, None),
            Identity::ForcedLogout { user_id, headers } => {
                tracing::info!(
                    user_id = %user_id,
                    redirect_to = FORCED_LOGOUT_REDIRECT,
                    "Forced logout of orphaned session"
                );
                (None, Some(headers), Some(FORCED_LOGOUT_REDIRECT.to_string()))
            }
        };

        let (toast, toast_headers) = self.toasts.peek(headers);

        let request_info = RequestInfo {
            hints: client_hints::get_hints(headers),
            origin: request_info::get_domain_url(headers, &parts.uri),
            path: parts.uri.path().to_string(),
            user_prefs: UserPrefs {
                theme: theme::get_theme(headers),
            },
        };
        let wagmi_initial = cookies::raw_cookie_pair(headers, WAGMI_COOKIE).map(str::to_owned);

        let payload = RootPayload {
            user,
            request_info,
            env: PublicEnv::clone(&self.env),
            toast,
            honey_props,
            wagmi_initial,
        };

        let mut server_timing = HeaderMap::new();
        server_timing.insert(SERVER_TIMING, timings.header_value()?);

        let headers = combine_headers([
            Some(&server_timing),
            Some(&toast_headers),
            session_headers.as_ref(),
        ]);

        histogram!(BOOTSTRAP_DURATION).record(started.elapsed().as_secs_f64());
        tracing::debug!(
            path = parts.uri.path(),
            elapsed = ?started.elapsed(),
            "Bootstrapped request"
        );

        Ok(Bootstrap {
            payload,
            headers,
            redirect_to,
        })
    }
}

/// Only same-origin paths are followed after login.
fn is_local_path(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.starts_with("/\\")
}
