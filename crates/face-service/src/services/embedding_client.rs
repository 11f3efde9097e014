//! Client for the face embedding sidecar.
//!
//! The sidecar detects faces in an uploaded image and returns one embedding
//! per face with a liveness verdict. It answers 422 when it finds no face.

use crate::errors::FaceError;
use crate::models::FaceEmbedding;
use crate::observability::metrics::record_upstream_request;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

const EMBEDDING_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Trait for face embedding (enables mocking).
#[async_trait::async_trait]
pub trait FaceEmbedder: Send + Sync {
    /// Detect faces in `image` and embed each one.
    ///
    /// Returns an empty list when no face is found.
    async fn embed(&self, image: Bytes) -> Result<Vec<FaceEmbedding>, FaceError>;
}

#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
}

impl EmbeddingClient {
    pub fn new(base_url: String) -> Result<Self, FaceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(EMBEDDING_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "face.services.embedding", error = %e, "Failed to build HTTP client");
                FaceError::Internal(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self { client, base_url })
    }
}

#[async_trait::async_trait]
impl FaceEmbedder for EmbeddingClient {
    #[instrument(skip_all, name = "face.embedding.embed", fields(image_bytes = image.len()))]
    async fn embed(&self, image: Bytes) -> Result<Vec<FaceEmbedding>, FaceError> {
        let start = Instant::now();
        let url = format!("{}/embed", self.base_url);

        let result = async {
            let response = self
                .client
                .post(&url)
                .header("Content-Type", "application/octet-stream")
                .body(image)
                .send()
                .await
                .map_err(|e| {
                    warn!(target: "face.services.embedding", error = %e, "Embedding request failed");
                    FaceError::Embedding(format!("request failed: {e}"))
                })?;

            match response.status() {
                StatusCode::UNPROCESSABLE_ENTITY => Ok(Vec::new()),
                status if status.is_success() => {
                    response.json::<Vec<FaceEmbedding>>().await.map_err(|e| {
                        warn!(target: "face.services.embedding", error = %e, "Invalid embedding response");
                        FaceError::Embedding(format!("invalid response body: {e}"))
                    })
                }
                status => {
                    warn!(target: "face.services.embedding", status = %status, "Embedding service error");
                    Err(FaceError::Embedding(format!("status {status}")))
                }
            }
        }
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        record_upstream_request("embedder", status, start.elapsed());

        result
    }
}
