use async_trait::async_trait;
use http::header::{HeaderMap, SET_COOKIE};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use super::{SessionStore, UserId};
use crate::cookies::{self, CookieOptions, SetCookie};
use crate::errors::StoreError;
use crate::signing::{self, Signer};

pub const SESSION_COOKIE: &str = "en_session";
pub const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
struct Session {
    user_id: UserId,
    expires_at: SystemTime,
}

/// Sessions kept in process memory, referenced by a signed `en_session` cookie.
///
/// Unknown and expired session ids read as "no session". Expired sessions are
/// dropped when a request presents them, and by [`CookieSessionStore::run_purger`]
/// for the ones nobody comes back for.
pub struct CookieSessionStore {
    signer: Signer,
    options: CookieOptions,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl CookieSessionStore {
    pub fn new(signer: Signer, options: CookieOptions, ttl: Duration) -> Self {
        Self {
            signer,
            options,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drops every session whose expiration has passed.
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }

    /// Purges expired sessions every `period`. Never returns.
    pub async fn run_purger(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = self.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = self.len(), "Purged expired sessions");
            }
        }
    }

    fn session_id<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        let raw = cookies::get_cookie(headers, SESSION_COOKIE)?;
        match self.signer.unsign(raw) {
            Ok(session_id) => Some(session_id),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring session cookie with invalid signature");
                None
            }
        }
    }
}

#[async_trait]
impl SessionStore for CookieSessionStore {
    async fn get_session_user_id(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<UserId>, StoreError> {
        let Some(session_id) = self.session_id(headers) else {
            return Ok(None);
        };

        let session = self.sessions.read().get(session_id).cloned();
        match session {
            Some(session) if session.expires_at > SystemTime::now() => Ok(Some(session.user_id)),
            Some(_) => {
                self.sessions.write().remove(session_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn create_session(&self, user_id: &str) -> Result<HeaderMap, StoreError> {
        let expires_at = SystemTime::now()
            .checked_add(self.ttl)
            .ok_or_else(|| StoreError::Unavailable("session expiration out of range".into()))?;

        let session_id = signing::random_id();
        let cookie = SetCookie::new(SESSION_COOKIE, self.signer.sign(&session_id))
            .max_age(self.ttl)
            .with_options(&self.options)
            .to_header_value()?;

        self.sessions.write().insert(
            session_id,
            Session {
                user_id: user_id.to_owned(),
                expires_at,
            },
        );

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, cookie);
        Ok(headers)
    }

    async fn invalidate_session(&self, headers: &HeaderMap) -> Result<HeaderMap, StoreError> {
        if let Some(session_id) = self.session_id(headers) {
            self.sessions.write().remove(session_id);
        }

        let mut cleared = HeaderMap::new();
        cleared.append(
            SET_COOKIE,
            SetCookie::expired(SESSION_COOKIE)
                .with_options(&self.options)
                .to_header_value()?,
        );
        Ok(cleared)
    }
}
