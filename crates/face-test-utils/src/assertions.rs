//! Custom test assertions for expressive tests
//!
//! Token assertions read the header and payload without checking the
//! signature; pair them with a `TokenVerifier` when validity matters.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;

fn decode_segment(token: &str, index: usize) -> Value {
    let segment = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT is missing segment {index}"));
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT segment {index}: {e}"));
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("Failed to parse JWT segment {index} as JSON: {e}"))
}

/// Custom assertions for credential tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_credential_shape()
///     .assert_signed_by(&store.current_kid())
///     .assert_claim("user_id", "alice");
/// ```
pub trait TokenAssertions {
    /// Assert three segments, RS256, a kid, and the issuer/audience pair
    fn assert_credential_shape(&self) -> &Self;

    /// Assert that the header names `kid`
    fn assert_signed_by(&self, kid: &str) -> &Self;

    /// Assert that a payload claim equals `expected`
    fn assert_claim(&self, name: &str, expected: impl Into<Value>) -> &Self;

    /// Assert `exp - iat` equals `seconds`
    fn assert_lifetime(&self, seconds: i64) -> &Self;
}

impl TokenAssertions for str {
    fn assert_credential_shape(&self) -> &Self {
        let parts = self.split('.').count();
        assert_eq!(
            parts, 3,
            "JWT must have 3 parts (header.payload.signature), got {parts}"
        );

        let header = decode_segment(self, 0);
        assert_eq!(header["alg"], "RS256", "Expected RS256 algorithm");
        assert!(header["kid"].is_string(), "Expected a kid in the header");

        let claims = decode_segment(self, 1);
        assert_eq!(claims["iss"], common::jwt::TOKEN_ISSUER);
        assert_eq!(claims["aud"], common::jwt::TOKEN_AUDIENCE);
        assert!(claims["iat"].is_i64(), "iat must be an integer");
        assert!(claims["exp"].is_i64(), "exp must be an integer");

        self
    }

    fn assert_signed_by(&self, kid: &str) -> &Self {
        let header = decode_segment(self, 0);
        assert_eq!(
            header["kid"].as_str(),
            Some(kid),
            "Expected kid '{kid}', got {}",
            header["kid"]
        );
        self
    }

    fn assert_claim(&self, name: &str, expected: impl Into<Value>) -> &Self {
        let claims = decode_segment(self, 1);
        let expected = expected.into();
        assert_eq!(
            claims[name], expected,
            "Claim '{name}' mismatch: expected {expected}, got {}",
            claims[name]
        );
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims = decode_segment(self, 1);
        let iat = claims["iat"].as_i64().unwrap_or_default();
        let exp = claims["exp"].as_i64().unwrap_or_default();
        assert_eq!(exp - iat, seconds, "Expected lifetime {seconds}s");
        self
    }
}

/// Assert the `{message, success, statusCode, data?}` envelope and that
/// `statusCode` matches the HTTP status.
pub fn assert_envelope(body: &Value, http_status: u16, success: bool) {
    assert_eq!(
        body["statusCode"], http_status,
        "statusCode must equal the HTTP status, body: {body}"
    );
    assert_eq!(body["success"], success, "unexpected success flag, body: {body}");
    assert!(body["message"].is_string(), "message must be a string");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token(header: Value, payload: Value) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn test_credential_shape() {
        let token = token(
            json!({"alg": "RS256", "typ": "JWT", "kid": "k1"}),
            json!({"iss": "face-service", "aud": "core-service", "iat": 100, "exp": 400, "user_id": "u"}),
        );

        token
            .as_str()
            .assert_credential_shape()
            .assert_signed_by("k1")
            .assert_claim("user_id", "u")
            .assert_lifetime(300);
    }

    #[test]
    #[should_panic(expected = "JWT must have 3 parts")]
    fn test_credential_shape_rejects_two_parts() {
        "invalid.token".assert_credential_shape();
    }

    #[test]
    #[should_panic(expected = "Expected RS256")]
    fn test_credential_shape_rejects_other_algorithms() {
        let token = token(json!({"alg": "HS256", "kid": "k"}), json!({}));
        token.as_str().assert_credential_shape();
    }

    #[test]
    fn test_envelope() {
        assert_envelope(
            &json!({"message": "ok", "success": true, "statusCode": 200}),
            200,
            true,
        );
    }
}
