use async_trait::async_trait;
use http::Request;
use http::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use http::request::Parts;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::auth::{IdentityResolver, Principal, SessionStore, UserId, UserStore};
use crate::bootstrap::Bootstrapper;
use crate::cookies::CookieOptions;
use crate::env::PublicEnv;
use crate::errors::StoreError;
use crate::honeypot::Honeypot;
use crate::signing::Signer;
use crate::toast::ToastChannel;

pub fn principal(id: &str, username: &str) -> Principal {
    Principal {
        id: id.to_string(),
        name: None,
        username: username.to_string(),
        image: None,
        roles: Vec::new(),
    }
}

/// Session store that reports the same user id for every request.
pub struct StaticSessionStore {
    user_id: Option<UserId>,
    invalidations: AtomicUsize,
    created: Mutex<Vec<UserId>>,
}

impl StaticSessionStore {
    pub fn new(user_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_owned),
            invalidations: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    /// User ids sessions were created for, in order.
    pub fn created(&self) -> Vec<UserId> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl SessionStore for StaticSessionStore {
    async fn get_session_user_id(
        &self,
        _headers: &HeaderMap,
    ) -> Result<Option<UserId>, StoreError> {
        Ok(self.user_id.clone())
    }

    async fn create_session(&self, user_id: &str) -> Result<HeaderMap, StoreError> {
        self.created.lock().push(user_id.to_owned());
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_str(&format!("en_session={user_id}; Path=/"))?,
        );
        Ok(headers)
    }

    async fn invalidate_session(&self, _headers: &HeaderMap) -> Result<HeaderMap, StoreError> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("en_session=; Path=/; Max-Age=0"),
        );
        Ok(headers)
    }
}

pub struct FailingUserStore;

#[async_trait]
impl UserStore for FailingUserStore {
    async fn find_user_by_id(&self, _id: &str) -> Result<Option<Principal>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn find_user_by_username(
        &self,
        _username: &str,
    ) -> Result<Option<Principal>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

pub const TOAST_SECRET: &str = "toast-secret";

pub fn bootstrapper(
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
) -> Bootstrapper {
    Bootstrapper::new(
        IdentityResolver::new(sessions, users),
        ToastChannel::new(Signer::new(TOAST_SECRET), CookieOptions::default()).unwrap(),
        Arc::new(Honeypot::new(Signer::new("honeypot-secret"))),
        PublicEnv::new("test", BTreeMap::new()),
    )
}

pub fn request_parts(uri: &str, cookie: Option<&str>) -> Parts {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(()).unwrap().into_parts().0
}
