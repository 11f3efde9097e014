//! Credential token utilities shared by the issuer, the verifier, and tests.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Key ID inspection of unverified JWT headers
//! - iat validation logic
//! - The credential claims structure and its fixed issuer/audience
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Header inspection never implies the token is trusted
//! - Generic error messages prevent information leakage
//! - Caller-supplied claims are redacted in Debug output

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Oversized tokens are rejected before any base64 decoding or signature
/// work. A credential token with a full registration payload is well under
/// 2KB.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance for the `iat` claim (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Upper bound for configurable clock skew (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Issuer stamped on every credential token.
pub const TOKEN_ISSUER: &str = "face-service";

/// Audience stamped on every credential token.
pub const TOKEN_AUDIENCE: &str = "core-service";

/// Claim names owned by the issuer. Caller-supplied values for these are
/// replaced when a token is built.
pub const RESERVED_CLAIMS: [&str; 4] = ["iss", "aud", "iat", "exp"];

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting or validating a JWT.
///
/// All variants share one message so callers cannot distinguish them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not a three-part JWT with a JSON object header.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Claims Types
// =============================================================================

/// Claims carried by a credential token.
///
/// The four registered claims are fixed by the issuer; everything else the
/// caller supplied (a matched `user_id`, or registration fields) lives in
/// `extra` and is flattened into the JWT payload.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Issuer, always [`TOKEN_ISSUER`] for tokens minted by this service.
    pub iss: String,

    /// Audience, always [`TOKEN_AUDIENCE`] when issued here. The array form
    /// of RFC 7519 is read too and collapses to [`TOKEN_AUDIENCE`] when it
    /// names it, otherwise to its first entry.
    #[serde(deserialize_with = "deserialize_audience")]
    pub aud: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Caller-supplied claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for CredentialClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extra_keys: Vec<&str> = self.extra.keys().map(String::as_str).collect();
        f.debug_struct("CredentialClaims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("extra_keys", &extra_keys)
            .finish()
    }
}

impl CredentialClaims {
    /// Build claims for a token issued at `iat` that expires at `exp`.
    ///
    /// Reserved claim names are dropped from `extra` so the injected values
    /// always win.
    #[must_use]
    pub fn new(mut extra: Map<String, Value>, iat: i64, exp: i64) -> Self {
        for reserved in RESERVED_CLAIMS {
            extra.remove(reserved);
        }

        Self {
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat,
            exp,
            extra,
        }
    }

    /// Look up a caller-supplied claim.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// The matched user identifier, when the token was issued for a
    /// post-match handoff.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.extra.get("user_id").and_then(Value::as_str)
    }
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Audience {
        Single(String),
        Many(Vec<String>),
    }

    match Audience::deserialize(deserializer)? {
        Audience::Single(aud) => Ok(aud),
        Audience::Many(auds) => {
            if auds.iter().any(|aud| aud == TOKEN_AUDIENCE) {
                return Ok(TOKEN_AUDIENCE.to_string());
            }
            auds.into_iter()
                .next()
                .ok_or_else(|| serde::de::Error::custom("empty audience"))
        }
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Read the `kid` (key ID) from a JWT header without verifying the signature.
///
/// Returns `Ok(None)` when the header parses but carries no usable `kid`;
/// verifiers then fall back to their natural key order.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - The signature is NOT checked here; the token must still be verified
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three parts, bad base64, or the header is not a
///   JSON object
pub fn peek_kid(token: &str) -> Result<Option<String>, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let Some(header) = header.as_object() else {
        tracing::debug!(target: "common.jwt", "JWT header is not a JSON object");
        return Err(JwtValidationError::MalformedToken);
    };

    Ok(header
        .get("kid")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string))
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat` is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// # Errors
///
/// Same as [`validate_iat`].
pub fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // clock_skew is bounded by MAX_CLOCK_SKEW in configuration
    let clock_skew_secs = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Encode an unsigned big-endian integer (RSA modulus or exponent) as a JWK
/// member: base64url without padding.
#[must_use]
pub fn encode_rsa_component(be_bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(be_bytes)
}

/// Decode a JWK `n` or `e` member back into big-endian bytes.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the value is not unpadded base64url.
pub fn decode_rsa_component(b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(b64url)
}

// =============================================================================
// Tests
// =============================================================================
