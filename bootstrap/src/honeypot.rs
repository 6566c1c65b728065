//! Spam protection for public forms.
//!
//! Every form carries a hidden field that humans leave empty and a signed
//! "valid from" timestamp. The bootstrap issues the field names and the
//! timestamp for the page; form handlers call [`HoneypotIssuer::check`] on submit.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::signing::Signer;

pub const DEFAULT_NAME_FIELD: &str = "name__confirm";
pub const DEFAULT_VALID_FROM_FIELD: &str = "from__confirm";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoneypotInputProps {
    pub name_field_name: String,
    pub valid_from_field_name: String,
    pub encrypted_valid_from: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HoneypotError {
    #[error("missing honeypot input")]
    MissingInput,
    #[error("honeypot input not empty")]
    NotEmpty,
    #[error("missing honeypot valid from input")]
    MissingValidFrom,
    #[error("invalid honeypot valid from input")]
    InvalidValidFrom,
    #[error("honeypot valid from is in future")]
    ValidFromInFuture,
}

/// Issues the per-render honeypot field names and token, and checks submissions against them.
#[async_trait]
pub trait HoneypotIssuer: Send + Sync {
    async fn input_props(&self) -> HoneypotInputProps;

    fn check(&self, form: &HashMap<String, String>) -> Result<(), HoneypotError>;
}

pub struct Honeypot {
    signer: Signer,
    name_field_name: String,
    valid_from_field_name: String,
}

impl Honeypot {
    pub fn new(signer: Signer) -> Self {
        Self {
            signer,
            name_field_name: DEFAULT_NAME_FIELD.to_string(),
            valid_from_field_name: DEFAULT_VALID_FROM_FIELD.to_string(),
        }
    }

    pub fn props_at(&self, now: SystemTime) -> HoneypotInputProps {
        HoneypotInputProps {
            name_field_name: self.name_field_name.clone(),
            valid_from_field_name: self.valid_from_field_name.clone(),
            encrypted_valid_from: self.signer.sign(&unix_millis(now).to_string()),
        }
    }

    pub fn check_at(
        &self,
        form: &HashMap<String, String>,
        now: SystemTime,
    ) -> Result<(), HoneypotError> {
        let name = form
            .get(&self.name_field_name)
            .ok_or(HoneypotError::MissingInput)?;
        if !name.is_empty() {
            return Err(HoneypotError::NotEmpty);
        }

        let signed = form
            .get(&self.valid_from_field_name)
            .ok_or(HoneypotError::MissingValidFrom)?;
        let valid_from: u128 = self
            .signer
            .unsign(signed)
            .ok()
            .and_then(|millis| millis.parse().ok())
            .ok_or(HoneypotError::InvalidValidFrom)?;

        if valid_from > unix_millis(now) {
            return Err(HoneypotError::ValidFromInFuture);
        }
        Ok(())
    }
}

#[async_trait]
impl HoneypotIssuer for Honeypot {
    async fn input_props(&self) -> HoneypotInputProps {
        self.props_at(SystemTime::now())
    }

    fn check(&self, form: &HashMap<String, String>) -> Result<(), HoneypotError> {
        self.check_at(form, SystemTime::now())
    }
}

/// Decodes an `application/x-www-form-urlencoded` body. Later duplicates win.
pub fn parse_form(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

fn unix_millis(at: SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
