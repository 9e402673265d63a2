//! Webhook signature verification.
//!
//! The platform signs every delivery with `base64(HMAC-SHA256(channel_secret, body))`
//! and sends it in the `X-Line-Signature` header.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Verifies webhook bodies against the channel secret.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self) -> Option<HmacSha256> {
        match HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()) {
            Ok(mac) => Some(mac),
            Err(_) => {
                warn!("failed to create HMAC");
                None
            }
        }
    }

    /// Signature the platform would send for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let Some(mut mac) = self.mac() else {
            return String::new();
        };
        mac.update(body);
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Check `signature_header` against `body`. Pure function of secret, body and header.
    pub fn verify(&self, body: &[u8], signature_header: &str) -> bool {
        let expected = match STANDARD.decode(signature_header.trim()) {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!("invalid signature header format (not base64)");
                return false;
            }
        };

        let Some(mut mac) = self.mac() else {
            return false;
        };
        mac.update(body);
        // Constant-time comparison.
        mac.verify_slice(&expected).is_ok()
    }
}
