//! One-shot notices ("toasts") carried to the next page load in a signed cookie.
//!
//! Any handler may queue a toast by setting the `en_toast` cookie (see
//! [`ToastChannel::create_toast_headers`]). The bootstrap reads it with
//! [`ToastChannel::peek`], which always hands back a `Set-Cookie` header that
//! expires the cookie, so a notice is displayed at most once and a corrupt
//! cookie cannot stick around.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use http::header::{HeaderMap, HeaderValue, InvalidHeaderValue, LOCATION, SET_COOKIE};
use serde::{Deserialize, Serialize};
use shared::counter;

use crate::cookies::{self, CookieOptions, SetCookie};
use crate::errors::Result;
use crate::metrics_defs::TOASTS_MALFORMED;
use crate::signing::{self, SignatureError, Signer};

pub const TOAST_COOKIE: &str = "en_toast";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastType {
    Message,
    Success,
    Error,
    Info,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToastType>,
}

/// A toast as handlers describe it; the id is generated when not given.
#[derive(Clone, Debug, Default)]
pub struct ToastInput {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub kind: Option<ToastType>,
}

impl ToastInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(mut self, kind: ToastType) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl From<ToastInput> for Toast {
    fn from(input: ToastInput) -> Self {
        Toast {
            id: input.id.unwrap_or_else(signing::random_id),
            title: input.title,
            description: input.description,
            kind: input.kind,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToastDecodeError {
    #[error("bad signature: {0}")]
    Signature(#[from] SignatureError),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct ToastChannel {
    signer: Signer,
    options: CookieOptions,
    clear_cookie: HeaderValue,
}

impl ToastChannel {
    pub fn new(signer: Signer, options: CookieOptions) -> Result<Self, InvalidHeaderValue> {
        let clear_cookie = SetCookie::expired(TOAST_COOKIE)
            .with_options(&options)
            .to_header_value()?;

        Ok(Self {
            signer,
            options,
            clear_cookie,
        })
    }

    pub fn encode(&self, toast: &Toast) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(toast)?;
        Ok(self.signer.sign(&URL_SAFE_NO_PAD.encode(json)))
    }

    pub fn decode(&self, raw: &str) -> Result<Toast, ToastDecodeError> {
        let payload = self.signer.unsign(raw)?;
        let json = URL_SAFE_NO_PAD.decode(payload)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Reads the pending toast, if any, and the header that clears it for the next request.
    ///
    /// The clearing header is returned in every case, including when no cookie was
    /// sent or the cookie could not be decoded.
    pub fn peek(&self, headers: &HeaderMap) -> (Option<Toast>, HeaderMap) {
        let toast = cookies::get_cookie(headers, TOAST_COOKIE).and_then(|raw| {
            self.decode(raw)
                .inspect_err(|e| {
                    tracing::warn!(error = %e, "Discarding malformed toast cookie");
                    counter!(TOASTS_MALFORMED).increment(1);
                })
                .ok()
        });

        let mut clear = HeaderMap::new();
        clear.append(SET_COOKIE, self.clear_cookie.clone());
        (toast, clear)
    }

    /// Headers that queue `input` for display on the next page load.
    pub fn create_toast_headers(&self, input: ToastInput) -> Result<HeaderMap> {
        let toast = Toast::from(input);
        let cookie = SetCookie::new(TOAST_COOKIE, self.encode(&toast)?)
            .with_options(&self.options)
            .to_header_value()?;

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, cookie);
        Ok(headers)
    }

    /// Headers for a redirect to `location` that shows `input` once the target loads.
    pub fn redirect_with_toast(&self, location: &str, input: ToastInput) -> Result<HeaderMap> {
        let mut headers = self.create_toast_headers(input)?;
        headers.insert(LOCATION, HeaderValue::from_str(location)?);
        Ok(headers)
    }
}
