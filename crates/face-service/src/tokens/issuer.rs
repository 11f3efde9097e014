use crate::errors::FaceError;
use crate::keys::KeyStore;
use crate::observability::metrics::record_token_issuance;
use chrono::{DateTime, Utc};
use common::jwt::CredentialClaims;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument};

/// Signs credential tokens with the current key generation.
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<KeyStore>,
    default_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(store: Arc<KeyStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token valid for the configured default lifetime.
    pub fn issue_default(&self, claims: Map<String, Value>) -> Result<String, FaceError> {
        self.issue(claims, self.default_ttl)
    }

    /// Issue a token valid for `ttl` from now.
    ///
    /// Caller claims named `iss`, `aud`, `iat` or `exp` are replaced by the
    /// issuer's values.
    pub fn issue(&self, claims: Map<String, Value>, ttl: Duration) -> Result<String, FaceError> {
        self.issue_at(claims, ttl, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`.
    #[instrument(skip_all, name = "face.token.issue")]
    pub fn issue_at(
        &self,
        claims: Map<String, Value>,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String, FaceError> {
        let start = Instant::now();
        let result = self.sign(claims, ttl, issued_at);

        let status = if result.is_ok() { "success" } else { "error" };
        record_token_issuance(status, start.elapsed());

        result
    }

    fn sign(
        &self,
        claims: Map<String, Value>,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String, FaceError> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| FaceError::Crypto("Token lifetime out of range".to_string()))?;

        let iat = issued_at.timestamp();
        let claims = CredentialClaims::new(claims, iat, iat.saturating_add(ttl_secs));

        // One snapshot: the kid in the header always names the key that signs.
        let signing_key = self.store.current_signing_key();
        let token = signing_key
            .sign(&signing_key.header(), &claims)
            .map_err(|e| {
                error!(target: "face.token", kid = %signing_key.kid(), error = %e, "Token signing failed");
                e
            })?;

        debug!(
            target: "face.token",
            kid = %signing_key.kid(),
            ttl_secs = ttl_secs,
            "Credential token issued"
        );

        Ok(token)
    }
}
