//! Face index over the Qdrant REST API.
//!
//! Embeddings are stored as points in one collection; each point's payload
//! carries `user_id`, `email` and `registered_at`.

use crate::errors::FaceError;
use crate::models::{FaceMatch, FaceRecord};
use crate::observability::metrics::record_upstream_request;
use common::secret::{ExposeSecret, SecretString};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

const QDRANT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Trait for nearest-face search and storage (enables mocking).
#[async_trait::async_trait]
pub trait FaceIndex: Send + Sync {
    /// Best match scoring at least `score_threshold`, if any.
    async fn find_match(
        &self,
        embedding: &[f32],
        score_threshold: f32,
    ) -> Result<Option<FaceMatch>, FaceError>;

    /// Insert or replace a face record.
    async fn upsert(&self, record: FaceRecord) -> Result<(), FaceError>;
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a [f32],
    limit: u32,
    with_payload: [&'static str; 2],
    score_threshold: f32,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Clone)]
pub struct QdrantFaceIndex {
    client: Client,
    endpoint: String,
    collection: String,
    api_key: Option<SecretString>,
}

impl QdrantFaceIndex {
    pub fn new(
        endpoint: String,
        collection: String,
        api_key: Option<SecretString>,
    ) -> Result<Self, FaceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(QDRANT_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "face.services.qdrant", error = %e, "Failed to build HTTP client");
                FaceError::Internal(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            collection,
            api_key,
        })
    }

    fn points_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}/points{suffix}",
            self.endpoint, self.collection
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<reqwest::Response, FaceError> {
        let start = Instant::now();
        let result = self.authorize(request).send().await;

        let response = match result {
            Ok(response) if response.status().is_success() => {
                record_upstream_request("vector_db", "success", start.elapsed());
                return Ok(response);
            }
            Ok(response) => response,
            Err(e) => {
                record_upstream_request("vector_db", "error", start.elapsed());
                warn!(target: "face.services.qdrant", operation, error = %e, "Vector database request failed");
                return Err(FaceError::FaceIndex(format!("{operation} request failed: {e}")));
            }
        };

        record_upstream_request("vector_db", "error", start.elapsed());
        let status = response.status();
        warn!(target: "face.services.qdrant", operation, status = %status, "Vector database returned error status");
        Err(FaceError::FaceIndex(format!("{operation} returned {status}")))
    }
}

#[async_trait::async_trait]
impl FaceIndex for QdrantFaceIndex {
    #[instrument(skip_all, name = "face.qdrant.find_match")]
    async fn find_match(
        &self,
        embedding: &[f32],
        score_threshold: f32,
    ) -> Result<Option<FaceMatch>, FaceError> {
        let body = QueryRequest {
            query: embedding,
            limit: 1,
            with_payload: ["user_id", "email"],
            score_threshold,
        };

        let response = self
            .send(self.client.post(self.points_url("/query")).json(&body), "query")
            .await?;

        let parsed: QueryResponse = response.json().await.map_err(|e| {
            warn!(target: "face.services.qdrant", error = %e, "Invalid query response");
            FaceError::FaceIndex(format!("invalid query response: {e}"))
        })?;

        Ok(parsed.result.points.into_iter().next().map(|point| {
            let payload = point.payload.unwrap_or_default();
            let text = |name: &str| payload.get(name).and_then(Value::as_str).map(str::to_string);
            FaceMatch {
                score: point.score,
                user_id: text("user_id"),
                email: text("email"),
            }
        }))
    }

    #[instrument(skip_all, name = "face.qdrant.upsert")]
    async fn upsert(&self, record: FaceRecord) -> Result<(), FaceError> {
        let body = json!({
            "points": [{
                "id": record.id.to_string(),
                "vector": record.embedding,
                "payload": {
                    "user_id": record.user_id,
                    "email": record.email,
                    "registered_at": record.registered_at,
                },
            }],
        });

        self.send(
            self.client
                .put(self.points_url("?wait=true"))
                .json(&body),
            "upsert",
        )
        .await?;

        Ok(())
    }
}
