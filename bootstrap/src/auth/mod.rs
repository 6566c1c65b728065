//! Resolving the authenticated principal of a request.
//!
//! Identity is resolved from two collaborators: a [`SessionStore`] that maps the
//! request's session cookie to a user id, and a [`UserStore`] that loads the
//! user record with its roles and permissions.
//!
//! A session pointing at a user that no longer exists is an inconsistency, not
//! a normal logged-out request. [`IdentityResolver::resolve_user`] reports it as
//! [`Identity::ForcedLogout`] together with the headers that invalidate the
//! session, and the caller redirects to a safe location.

pub mod session;
pub mod users;

use async_trait::async_trait;
use http::Uri;
use http::header::HeaderMap;
use serde::{Deserialize, Serialize};
use shared::counter;
use std::sync::Arc;

use crate::errors::{BootstrapError, Result, StoreError};
use crate::metrics_defs::SESSIONS_ORPHANED;
use crate::timing::Timings;

pub use session::CookieSessionStore;
pub use users::InMemoryUserStore;

pub type UserId = String;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub entity: String,
    pub action: String,
    pub access: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// The authenticated user of one request and everything it is allowed to do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    pub username: String,
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }

    /// Checks a permission string of the form `action:entity[:access[,access]]`,
    /// e.g. `"delete:note:own,any"`. Without an access part any access level matches.
    pub fn has_permission(&self, permission: &str) -> bool {
        let mut parts = permission.splitn(3, ':');
        let (Some(action), Some(entity)) = (parts.next(), parts.next()) else {
            return false;
        };
        let access: Option<Vec<&str>> = parts.next().map(|a| a.split(',').collect());

        self.roles
            .iter()
            .flat_map(|role| &role.permissions)
            .any(|p| {
                p.action == action
                    && p.entity == entity
                    && access
                        .as_ref()
                        .is_none_or(|levels| levels.contains(&p.access.as_str()))
            })
    }
}

/// Maps a request's credentials to the user id it was issued for.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `Ok(None)` when the request carries no usable session.
    async fn get_session_user_id(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<UserId>, StoreError>;

    /// Starts a session for `user_id` and returns the headers that store its credential.
    async fn create_session(&self, user_id: &str) -> Result<HeaderMap, StoreError>;

    /// Destroys the request's session and returns the headers that clear its credential.
    async fn invalidate_session(&self, headers: &HeaderMap) -> Result<HeaderMap, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Ok(None)` means the user does not exist; `Err` means the store could not answer.
    async fn find_user_by_id(&self, id: &str) -> Result<Option<Principal>, StoreError>;

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Principal>, StoreError>;
}

#[derive(Debug)]
pub enum Identity {
    Anonymous,
    Authenticated(Principal),
    /// The session referenced a user missing from the store and has been invalidated.
    ForcedLogout { user_id: UserId, headers: HeaderMap },
}

#[derive(Clone)]
pub struct IdentityResolver {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(sessions: Arc<dyn SessionStore>, users: Arc<dyn UserStore>) -> Self {
        Self { sessions, users }
    }

    pub async fn get_user_id(&self, headers: &HeaderMap) -> Result<Option<UserId>> {
        Ok(self.sessions.get_session_user_id(headers).await?)
    }

    pub async fn resolve_user(&self, headers: &HeaderMap, timings: &Timings) -> Result<Identity> {
        let user_id = timings
            .time(
                "getUserId",
                Some("getUserId in root"),
                self.sessions.get_session_user_id(headers),
            )
            .await?;

        let Some(user_id) = user_id else {
            return Ok(Identity::Anonymous);
        };

        let user = timings
            .time(
                "find user",
                Some("find user in root"),
                self.users.find_user_by_id(&user_id),
            )
            .await?;

        match user {
            Some(principal) => Ok(Identity::Authenticated(principal)),
            None => {
                tracing::warn!(
                    user_id = %user_id,
                    "Session references a user that does not exist, logging out"
                );
                counter!(SESSIONS_ORPHANED).increment(1);
                let headers = self.sessions.invalidate_session(headers).await?;
                Ok(Identity::ForcedLogout { user_id, headers })
            }
        }
    }

    /// The current user id, or an `Unauthenticated` error that sends the visitor to the
    /// login page and back to `uri` afterwards.
    pub async fn require_user_id(&self, headers: &HeaderMap, uri: &Uri) -> Result<UserId> {
        match self.get_user_id(headers).await? {
            Some(user_id) => Ok(user_id),
            None => Err(BootstrapError::Unauthenticated {
                redirect_to: login_redirect(uri),
            }),
        }
    }

    pub async fn require_anonymous(&self, headers: &HeaderMap) -> Result<()> {
        match self.get_user_id(headers).await? {
            Some(_) => Err(BootstrapError::AlreadyAuthenticated),
            None => Ok(()),
        }
    }

    /// Opens a session for `username`. `None` when no such user exists.
    pub async fn login(&self, username: &str) -> Result<Option<(Principal, HeaderMap)>> {
        let Some(user) = self.users.find_user_by_username(username).await? else {
            return Ok(None);
        };
        let headers = self.sessions.create_session(&user.id).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(Some((user, headers)))
    }

    pub async fn logout(&self, headers: &HeaderMap) -> Result<HeaderMap> {
        Ok(self.sessions.invalidate_session(headers).await?)
    }
}

fn login_redirect(uri: &Uri) -> String {
    let return_to = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    if return_to == "/" {
        return "/login".to_string();
    }

    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("redirectTo", return_to)
        .finish();
    format!("/login?{query}")
}
