//! Request authentication shared by the ingress handlers.

use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::warn;

use chatrelay_core::config::WebhookAuthMode;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Check `body`/`headers` against the configured mode.
pub fn authenticate(
    mode: &WebhookAuthMode,
    headers: &HeaderMap,
    body: &[u8],
    secret: Option<&str>,
) -> Result<(), String> {
    match mode {
        WebhookAuthMode::HmacSha256 => verify_hmac_sha256(headers, body, secret),
        WebhookAuthMode::BearerToken => verify_bearer_token(headers, secret),
        WebhookAuthMode::None => Ok(()),
    }
}

/// Verify `sha256=<hex>` in X-Hub-Signature-256 over the raw body.
pub fn verify_hmac_sha256(
    headers: &HeaderMap,
    body: &[u8],
    secret: Option<&str>,
) -> Result<(), String> {
    let secret = secret.ok_or_else(|| "no HMAC secret configured".to_string())?;

    let sig_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing X-Hub-Signature-256 header".to_string())?;

    let sig_hex = sig_header
        .strip_prefix("sha256=")
        .ok_or_else(|| "malformed X-Hub-Signature-256 header".to_string())?;

    let expected =
        hex::decode(sig_hex).map_err(|_| "X-Hub-Signature-256 is not valid hex".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| "HMAC signature mismatch".to_string())
}

/// Verify a static token in the `Authorization: Bearer <token>` header.
pub fn verify_bearer_token(headers: &HeaderMap, secret: Option<&str>) -> Result<(), String> {
    let expected = secret.ok_or_else(|| "no bearer token configured".to_string())?;

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing Authorization header".to_string())?
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;

    if token == expected {
        Ok(())
    } else {
        Err("bearer token mismatch".to_string())
    }
}

pub fn auth_error(reason: String) -> (StatusCode, Json<Value>) {
    warn!(reason = %reason, "request authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication failed", "reason": reason})),
    )
}

/// `sha256=<hex>` signature for `body`, as a caller would compute it.
#[cfg(test)]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
