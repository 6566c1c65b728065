use http::header::InvalidHeaderValue;
use thiserror::Error;

use crate::config::ValidationError;
use crate::honeypot::HoneypotError;

/// Result type alias for bootstrap operations
pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;

/// Failures reported by the session and user store collaborators.
///
/// A user that does not exist is not an error: stores report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store returned an invalid header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// Errors that can occur while bootstrapping a request
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("identity lookup failed: {0}")]
    LookupFailure(#[from] StoreError),

    #[error("authentication required")]
    Unauthenticated { redirect_to: String },

    #[error("request is already authenticated")]
    AlreadyAuthenticated,

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("rejected form submission: {0}")]
    Honeypot(#[from] HoneypotError),

    #[error("could not read request body: {0}")]
    InvalidBody(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
