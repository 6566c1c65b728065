use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SignatureError {
    #[error("value is not signed")]
    Unsigned,
    #[error("invalid signature encoding: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("signature mismatch")]
    Mismatch,
}

/// Signs cookie payloads as `<payload>.<base64url HMAC-SHA256>`.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl Signer {
    pub fn new(secret: &str) -> Self {
        let mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        Self { mac }
    }

    pub fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{payload}.{signature}")
    }

    /// Returns the payload of a value produced by [`Signer::sign`] with the same secret.
    pub fn unsign<'a>(&self, signed: &'a str) -> Result<&'a str, SignatureError> {
        let (payload, signature) = signed.rsplit_once('.').ok_or(SignatureError::Unsigned)?;
        let signature = URL_SAFE_NO_PAD.decode(signature)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SignatureError::Mismatch)?;

        Ok(payload)
    }
}

/// Random URL-safe identifier with 128 bits of entropy.
pub fn random_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_unsign() {
        let signer = Signer::new("s3cr3t");
        let signed = signer.sign("hello.world");

        assert!(signed.starts_with("hello.world."));
        assert_eq!(signer.unsign(&signed), Ok("hello.world"));
    }

    #[test]
    fn test_tampering_is_detected() {
        let signer = Signer::new("s3cr3t");
        let signed = signer.sign("user-1");

        let tampered = signed.replacen("user-1", "user-2", 1);
        assert_eq!(signer.unsign(&tampered), Err(SignatureError::Mismatch));

        let other = Signer::new("other");
        assert_eq!(other.unsign(&signed), Err(SignatureError::Mismatch));

        assert_eq!(signer.unsign("nodot"), Err(SignatureError::Unsigned));
        assert!(matches!(
            signer.unsign("payload.!!!"),
            Err(SignatureError::Base64(_))
        ));
    }

    #[test]
    fn test_random_ids_are_unique() {
        let a = random_id();
        let b = random_id();
        assert_eq!(a.len(), 22);
        assert_ne!(a, b);
    }
}
