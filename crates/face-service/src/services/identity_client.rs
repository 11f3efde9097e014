//! Identity backend HTTP client.
//!
//! Forwards face registrations to the core identity service. Each call
//! carries a freshly issued credential token as a bearer token plus the
//! shared internal service key.
//!
//! # Security
//!
//! - The bearer token and internal key are never logged
//! - Failures are logged server-side; clients get fixed messages

use crate::errors::FaceError;
use crate::observability::metrics::record_upstream_request;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Timeout for identity backend requests in seconds.
const IDENTITY_REQUEST_TIMEOUT_SECS: u64 = 10;

const FACE_REGISTER_PATH: &str = "/api/Auth/face-register";

/// Trait for identity backend operations (enables mocking).
#[async_trait::async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Register a user whose face passed the checks. Returns the backend's
    /// JSON response, which carries the created `user`.
    async fn register_face(&self, token: &str, payload: &Value) -> Result<Value, FaceError>;
}

#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
    internal_key: SecretString,
}

impl IdentityClient {
    pub fn new(base_url: String, internal_key: SecretString) -> Result<Self, FaceError> {
        Self::with_timeout(
            base_url,
            internal_key,
            Duration::from_secs(IDENTITY_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: String,
        internal_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, FaceError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "face.services.identity", error = %e, "Failed to build HTTP client");
                FaceError::Internal(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            internal_key,
        })
    }
}

#[async_trait::async_trait]
impl IdentityBackend for IdentityClient {
    #[instrument(skip_all, name = "face.identity.register_face")]
    async fn register_face(&self, token: &str, payload: &Value) -> Result<Value, FaceError> {
        let start = Instant::now();
        let url = format!("{}{FACE_REGISTER_PATH}", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("X-Internal-Key", self.internal_key.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                record_upstream_request("identity", "error", start.elapsed());
                if e.is_timeout() {
                    warn!(target: "face.services.identity", "Identity backend timed out");
                    FaceError::UpstreamTimeout
                } else {
                    warn!(target: "face.services.identity", error = %e, "Identity backend unreachable");
                    FaceError::UpstreamUnavailable
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            record_upstream_request("identity", "error", start.elapsed());
            let message = response.text().await.unwrap_or_default();
            warn!(
                target: "face.services.identity",
                status = %status,
                "Identity backend rejected registration"
            );
            return Err(FaceError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<Value>().await.map_err(|e| {
            record_upstream_request("identity", "error", start.elapsed());
            if e.is_timeout() {
                FaceError::UpstreamTimeout
            } else {
                warn!(target: "face.services.identity", error = %e, "Invalid identity backend response");
                FaceError::Internal(format!("invalid identity backend response: {e}"))
            }
        })?;

        record_upstream_request("identity", "success", start.elapsed());
        Ok(body)
    }
}
