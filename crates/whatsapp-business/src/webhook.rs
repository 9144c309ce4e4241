//! Webhook verification and payload extraction.

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
    tracing::{debug, warn},
};

use leadline_whatsapp::events::RawMessage;

use crate::types::WebhookPayload;

type HmacSha256 = Hmac<Sha256>;

/// Verify the webhook body signature.
///
/// The signature arrives in the `X-Hub-Signature-256` header as
/// `sha256=<hex>`, keyed with the configured app secret.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let Some(expected) = signature_header.strip_prefix("sha256=") else {
        warn!("invalid signature header format (missing sha256= prefix)");
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("failed to create HMAC");
            return false;
        },
    };

    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    // Constant-time comparison to prevent timing attacks.
    constant_time_eq(&computed, expected)
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Verify a webhook subscription handshake (GET request).
///
/// The platform sends `hub.mode=subscribe`, `hub.verify_token` and a
/// random `hub.challenge`; returns the challenge to echo back when the
/// token matches.
pub fn verify_webhook_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    verify_token: &str,
) -> Option<String> {
    let mode = mode?;
    let token = token?;
    let challenge = challenge?;

    if mode == "subscribe" && token == verify_token {
        Some(challenge.to_string())
    } else {
        None
    }
}

/// Pull the message events out of a verified payload.
///
/// Non-message change topics and payloads addressed to a different
/// business number are dropped here; content-level filtering happens in
/// the ingestion pipeline.
pub fn extract_messages(
    payload: WebhookPayload,
    phone_number_id: Option<&str>,
) -> Vec<RawMessage> {
    let mut out = Vec::new();
    for entry in payload.entry {
        for change in entry.changes {
            if change.field != "messages" {
                debug!(field = %change.field, "ignoring non-message webhook change");
                continue;
            }
            if let Some(expected) = phone_number_id
                && let Some(metadata) = &change.value.metadata
                && metadata.phone_number_id != expected
            {
                warn!(
                    expected,
                    received = %metadata.phone_number_id,
                    "phone number id mismatch"
                );
                continue;
            }
            out.extend(change.value.messages.into_iter().map(|m| m.into_raw()));
        }
    }
    out
}
