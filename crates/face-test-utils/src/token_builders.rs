//! Builder patterns for test data construction
//!
//! `TestTokenBuilder` signs arbitrary credential-shaped tokens, including
//! ones the issuer would never produce (wrong audience, expired, no kid).

use crate::crypto_fixtures::FixtureError;
use chrono::Utc;
use common::jwt::{TOKEN_AUDIENCE, TOKEN_ISSUER};
use face_service::keys::KeyPair;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Map, Value};

/// Builder for hand-crafted credential tokens
///
/// Defaults to a token the verifier accepts: correct issuer and audience,
/// issued now, valid for five minutes, kid taken from the signing key.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_audience("someone-else")
///     .sign_with(&key)?;
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    kid: KidChoice,
}

enum KidChoice {
    FromKey,
    Fixed(String),
    Omitted,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), Value::from(TOKEN_ISSUER));
        claims.insert("aud".to_string(), Value::from(TOKEN_AUDIENCE));
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now + 300));

        Self {
            claims,
            kid: KidChoice::FromKey,
        }
    }

    /// Set the `user_id` claim
    pub fn for_user(self, user_id: &str) -> Self {
        self.with_claim("user_id", Value::from(user_id))
    }

    /// Set any claim, including the registered ones
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Drop a claim entirely
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", Value::from(issuer))
    }

    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", Value::from(audience))
    }

    /// Set issued-at timestamp (Unix seconds)
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", Value::from(timestamp))
    }

    /// Set expiration timestamp (Unix seconds)
    pub fn expires_at(self, timestamp: i64) -> Self {
        self.with_claim("exp", Value::from(timestamp))
    }

    /// Expire `seconds` from now; negative values produce an expired token
    pub fn expires_in(self, seconds: i64) -> Self {
        self.expires_at(Utc::now().timestamp() + seconds)
    }

    /// Put `kid` in the header instead of the signing key's own kid
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = KidChoice::Fixed(kid.to_string());
        self
    }

    /// Leave `kid` out of the header
    pub fn without_kid(mut self) -> Self {
        self.kid = KidChoice::Omitted;
        self
    }

    /// The claims that would be signed
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Sign with `key` using RS256
    pub fn sign_with(self, key: &KeyPair) -> Result<String, FixtureError> {
        let mut header = key.header();
        header.kid = match self.kid {
            KidChoice::FromKey => Some(key.kid().to_string()),
            KidChoice::Fixed(kid) => Some(kid),
            KidChoice::Omitted => None,
        };

        Ok(key.sign(&header, &self.claims)?)
    }

    /// Sign with HS256 under `secret`; the verifier must refuse the algorithm
    pub fn sign_hs256(self, secret: &[u8]) -> Result<String, FixtureError> {
        let mut header = Header::new(Algorithm::HS256);
        if let KidChoice::Fixed(kid) = self.kid {
            header.kid = Some(kid);
        }

        jsonwebtoken::encode(&header, &self.claims, &EncodingKey::from_secret(secret))
            .map_err(|e| FixtureError::Token(e.to_string()))
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
