use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::auth::Principal;
use crate::cookies::CookieOptions;

pub const MAX_SESSION_EXPIRATION_DAYS: u64 = 3650;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Secret cannot be empty: {0}")]
    EmptySecret(&'static str),

    #[error("Session expiration must be at least one day")]
    ZeroSessionExpiration,

    #[error("Session expiration cannot exceed {MAX_SESSION_EXPIRATION_DAYS} days, got {0}")]
    SessionExpirationTooLong(u64),

    #[error("Duplicate user id: {0}")]
    DuplicateUser(String),
}

/// Deployment mode, exposed to the client as `ENV.MODE`
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Development,
    Production,
    Test,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
            Mode::Test => "test",
        }
    }
}

/// Bootstrap service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for page bootstrap requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    /// Keys for the signed cookies and honeypot tokens
    pub secrets: Secrets,
    #[serde(default)]
    pub cookies: CookieOptions,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub mode: Mode,
    /// Values forwarded to the client as `ENV`. Never put secrets here.
    #[serde(default)]
    pub public_env: BTreeMap<String, String>,
    /// Users preloaded into the in-memory user store
    #[serde(default)]
    pub users: Vec<Principal>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.secrets.validate()?;

        if self.session.expiration_days == 0 {
            return Err(ValidationError::ZeroSessionExpiration);
        }
        if self.session.expiration_days > MAX_SESSION_EXPIRATION_DAYS {
            return Err(ValidationError::SessionExpirationTooLong(
                self.session.expiration_days,
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for user in &self.users {
            if !seen.insert(&user.id) {
                return Err(ValidationError::DuplicateUser(user.id.clone()));
            }
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Secrets {
    pub session: String,
    pub toast: String,
    pub honeypot: String,
}

impl Secrets {
    fn validate(&self) -> Result<(), ValidationError> {
        for (name, secret) in [
            ("session", &self.session),
            ("toast", &self.toast),
            ("honeypot", &self.honeypot),
        ] {
            if secret.is_empty() {
                return Err(ValidationError::EmptySecret(name));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_expiration_days")]
    pub expiration_days: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.expiration_days.saturating_mul(24 * 60 * 60))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_expiration_days(),
        }
    }
}

fn default_expiration_days() -> u64 {
    30
}
