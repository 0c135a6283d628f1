//! Carrier webhook signature verification
//!
//! HMAC-SHA256 over the canonical URL followed by the form fields sorted
//! by key, each appended as `key` then `value`. The carrier sends the hex
//! digest in `X-Carrier-Signature`; comparison is constant-time.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::ServerError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-carrier-signature";

/// Compute the expected signature for a webhook request
pub fn compute_signature(auth_token: &str, url: &str, form: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = form.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut mac = HmacSha256::new_from_slice(auth_token.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(url.as_bytes());
    for (key, value) in sorted {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook request signature
///
/// No-op when verification is disabled (development). A missing or
/// mismatched header rejects the request.
pub fn verify_webhook(
    enabled: bool,
    auth_token: &str,
    headers: &HeaderMap,
    url: &str,
    form: &[(String, String)],
) -> Result<(), ServerError> {
    if !enabled {
        return Ok(());
    }

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided.is_empty() {
        return Err(ServerError::Auth("missing signature header".to_string()));
    }

    let expected = compute_signature(auth_token, url, form);
    if expected.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() != 1 {
        return Err(ServerError::Auth("invalid signature".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn form() -> Vec<(String, String)> {
        vec![
            ("SpeechResult".to_string(), "sure go ahead".to_string()),
            ("CallSid".to_string(), "CA123".to_string()),
        ]
    }

    #[test]
    fn test_signature_is_order_independent() {
        let url = "https://example.com/webhook/abc/turn";
        let mut reversed = form();
        reversed.reverse();
        assert_eq!(
            compute_signature("token", url, &form()),
            compute_signature("token", url, &reversed)
        );
    }

    #[test]
    fn test_signature_depends_on_url_and_token() {
        let a = compute_signature("token", "https://example.com/a", &form());
        let b = compute_signature("token", "https://example.com/b", &form());
        let c = compute_signature("other", "https://example.com/a", &form());
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let url = "https://example.com/webhook/abc/turn";
        let signature = compute_signature("token", url, &form());
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());
        assert!(verify_webhook(true, "token", &headers, url, &form()).is_ok());
    }

    #[test]
    fn test_verify_rejects_bad_signature() {
        let url = "https://example.com/webhook/abc/turn";
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("deadbeef"));
        assert!(verify_webhook(true, "token", &headers, url, &form()).is_err());
    }

    #[test]
    fn test_verify_rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(verify_webhook(true, "token", &headers, "https://x", &form()).is_err());
    }

    #[test]
    fn test_verify_disabled_passes_everything() {
        let headers = HeaderMap::new();
        assert!(verify_webhook(false, "token", &headers, "https://x", &form()).is_ok());
    }
}
