//! Webhook signature verification
//!
//! The processor signs each webhook delivery with HMAC-SHA256 over the raw
//! request body, sending the hex digest in a signature header. Verification
//! must run against the exact raw bytes that are later parsed; re-serialized
//! JSON would not match the signature.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::webhook::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Webhook verification failures
#[derive(Debug, Error)]
pub enum WebhookVerifyError {
    /// The signature does not match the payload
    #[error("Invalid signature")]
    InvalidSignature,

    /// The payload is not a well-formed event
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Computes the hex HMAC-SHA256 signature for a payload
///
/// Used by outbound tooling and by tests to produce valid deliveries.
pub fn sign_payload(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a webhook delivery and parses it into a typed event
///
/// The signature is checked against the raw payload bytes before any
/// parsing happens; the same bytes are then deserialized, so the verified
/// and processed payloads are identical.
pub fn construct_event(
    payload: &[u8],
    signature: &str,
    secret: &str,
) -> Result<WebhookEvent, WebhookVerifyError> {
    let expected = sign_payload(payload, secret);
    if expected != signature {
        tracing::warn!("webhook signature verification failed");
        return Err(WebhookVerifyError::InvalidSignature);
    }

    serde_json::from_slice(payload).map_err(|e| WebhookVerifyError::InvalidPayload(e.to_string()))
}
