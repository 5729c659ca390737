//! Per-provider signature verification (§4.7). Each check takes the raw
//! request body — never a re-serialized JSON value — since re-serialization
//! is not guaranteed to reproduce the bytes the provider signed over.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SLACK_SKEW_SECONDS: i64 = 300;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,
    #[error("malformed timestamp")]
    MalformedTimestamp,
    #[error("timestamp skew exceeds {SLACK_SKEW_SECONDS}s")]
    TimestampSkew,
    #[error("signature does not match")]
    Mismatch,
    #[error("malformed signature encoding")]
    MalformedSignature,
}

/// Slack request signing: HMAC-SHA256 over `v0:<timestamp>:<rawBody>`,
/// hex-encoded and prefixed `v0=`, compared in constant time. The timestamp
/// must be within 300 seconds of now to defeat replay.
pub fn verify_slack(signing_secret: &str, timestamp: &str, body: &[u8], signature: &str) -> Result<(), SignatureError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MalformedTimestamp)?;
    let skew = (Utc::now().timestamp() - ts).abs();
    if skew > SLACK_SKEW_SECONDS {
        return Err(SignatureError::TimestampSkew);
    }

    let expected_hex = signature
        .strip_prefix("v0=")
        .ok_or(SignatureError::MalformedSignature)?;
    let expected_bytes = hex::decode(expected_hex).map_err(|_| SignatureError::MalformedSignature)?;

    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts a key of any length");
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&expected_bytes).map_err(|_| SignatureError::Mismatch)
}

/// Asana request signing: HMAC-SHA256 over the raw body using the secret
/// captured on the `X-Hook-Secret` handshake, hex-encoded, compared in
/// constant time.
pub fn verify_asana(webhook_secret: &str, body: &[u8], signature: &str) -> Result<(), SignatureError> {
    let expected_bytes = hex::decode(signature).map_err(|_| SignatureError::MalformedSignature)?;
    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .expect("HMAC accepts a key of any length");
    mac.update(body);
    mac.verify_slice(&expected_bytes).map_err(|_| SignatureError::Mismatch)
}

/// Gmail push notifications arrive as a Pub/Sub envelope; there is no
/// signing secret to check, only the shape: `message.data` must be present
/// and non-empty.
pub fn verify_gmail_envelope(body: &serde_json::Value) -> Result<(), SignatureError> {
    let data = body
        .get("message")
        .and_then(|m| m.get("data"))
        .and_then(serde_json::Value::as_str);
    match data {
        Some(s) if !s.is_empty() => Ok(()),
        _ => Err(SignatureError::MissingHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_slack(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(b"v0:");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn slack_signature_round_trips() {
        let secret = "shh";
        let body = b"{\"type\":\"event_callback\"}";
        let ts = Utc::now().timestamp().to_string();
        let sig = sign_slack(secret, &ts, body);
        assert!(verify_slack(secret, &ts, body, &sig).is_ok());
    }

    #[test]
    fn slack_signature_rejects_altered_body() {
        let secret = "shh";
        let body = b"{\"type\":\"event_callback\"}";
        let ts = Utc::now().timestamp().to_string();
        let sig = sign_slack(secret, &ts, body);
        let altered = b"{\"type\":\"event_callbacK\"}";
        assert!(matches!(
            verify_slack(secret, &ts, altered, &sig),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn slack_signature_rejects_timestamp_skew() {
        let secret = "shh";
        let body = b"{}";
        let stale_ts = (Utc::now().timestamp() - 1000).to_string();
        let sig = sign_slack(secret, &stale_ts, body);
        assert!(matches!(
            verify_slack(secret, &stale_ts, body, &sig),
            Err(SignatureError::TimestampSkew)
        ));
    }

    #[test]
    fn asana_signature_round_trips() {
        let secret = "asana-secret";
        let body = b"{\"events\":[]}";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(verify_asana(secret, body, &sig).is_ok());
    }

    #[test]
    fn asana_signature_rejects_wrong_secret() {
        let body = b"{\"events\":[]}";
        let mut mac = HmacSha256::new_from_slice(b"correct-secret").unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(verify_asana("wrong-secret", body, &sig).is_err());
    }

    #[test]
    fn gmail_envelope_requires_message_data() {
        assert!(verify_gmail_envelope(&serde_json::json!({ "message": { "data": "xyz" } })).is_ok());
        assert!(verify_gmail_envelope(&serde_json::json!({ "message": {} })).is_err());
        assert!(verify_gmail_envelope(&serde_json::json!({})).is_err());
    }
}
