//! In-memory collaborator mocks
//!
//! Each mock records what it was asked so tests can assert on the calls
//! the face flows made.

use async_trait::async_trait;
use bytes::Bytes;
use face_service::errors::FaceError;
use face_service::models::{FaceEmbedding, FaceMatch, FaceRecord};
use face_service::services::{FaceEmbedder, FaceIndex, IdentityBackend};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Embedding vector used by `live_face()`.
pub const TEST_EMBEDDING: [f32; 4] = [0.12, 0.34, 0.56, 0.78];

/// A single detected face that passes the liveness check.
pub fn live_face() -> FaceEmbedding {
    FaceEmbedding {
        embedding: TEST_EMBEDDING.to_vec(),
        is_real: true,
    }
}

/// A single detected face that fails the liveness check.
pub fn spoofed_face() -> FaceEmbedding {
    FaceEmbedding {
        embedding: TEST_EMBEDDING.to_vec(),
        is_real: false,
    }
}

/// Embedder returning a fixed list of faces for every image.
pub struct MockFaceEmbedder {
    faces: Mutex<Vec<FaceEmbedding>>,
    calls: AtomicUsize,
}

impl MockFaceEmbedder {
    pub fn returning(faces: Vec<FaceEmbedding>) -> Self {
        Self {
            faces: Mutex::new(faces),
            calls: AtomicUsize::new(0),
        }
    }

    /// One live face.
    pub fn single_live_face() -> Self {
        Self::returning(vec![live_face()])
    }

    pub fn set_faces(&self, faces: Vec<FaceEmbedding>) {
        *self.faces.lock().unwrap() = faces;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceEmbedder for MockFaceEmbedder {
    async fn embed(&self, _image: Bytes) -> Result<Vec<FaceEmbedding>, FaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.faces.lock().unwrap().clone())
    }
}

/// Face index holding at most one canned match and recording upserts.
#[derive(Default)]
pub struct MockFaceIndex {
    found: Mutex<Option<FaceMatch>>,
    upserts: Mutex<Vec<FaceRecord>>,
    failing: Mutex<bool>,
}

impl MockFaceIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every query matches `user_id` (and `email`, when given).
    pub fn matching(user_id: &str, email: Option<&str>) -> Self {
        let index = Self::default();
        index.set_match(Some(FaceMatch {
            score: 0.97,
            user_id: Some(user_id.to_string()),
            email: email.map(str::to_string),
        }));
        index
    }

    pub fn set_match(&self, found: Option<FaceMatch>) {
        *self.found.lock().unwrap() = found;
    }

    /// Make every call fail like an unreachable database.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn upserts(&self) -> Vec<FaceRecord> {
        self.upserts.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), FaceError> {
        if *self.failing.lock().unwrap() {
            return Err(FaceError::FaceIndex("mock index unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FaceIndex for MockFaceIndex {
    async fn find_match(
        &self,
        _embedding: &[f32],
        _score_threshold: f32,
    ) -> Result<Option<FaceMatch>, FaceError> {
        self.check_available()?;
        Ok(self.found.lock().unwrap().clone())
    }

    async fn upsert(&self, record: FaceRecord) -> Result<(), FaceError> {
        self.check_available()?;
        self.upserts.lock().unwrap().push(record);
        Ok(())
    }
}

/// How `MockIdentityBackend` answers.
#[derive(Debug, Clone)]
pub enum IdentityReply {
    Success(Value),
    Status { status: u16, body: String },
    Timeout,
    Unreachable,
}

/// One call received by `MockIdentityBackend`.
#[derive(Debug, Clone)]
pub struct IdentityCall {
    pub token: String,
    pub payload: Value,
}

pub struct MockIdentityBackend {
    reply: Mutex<IdentityReply>,
    calls: Mutex<Vec<IdentityCall>>,
}

impl MockIdentityBackend {
    pub fn replying(reply: IdentityReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Backend that creates the user `{id, email}`.
    pub fn creating_user(user_id: &str, email: &str) -> Self {
        Self::replying(IdentityReply::Success(serde_json::json!({
            "accessToken": "core-service-session",
            "user": { "id": user_id, "email": email },
        })))
    }

    pub fn set_reply(&self, reply: IdentityReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> Vec<IdentityCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityBackend for MockIdentityBackend {
    async fn register_face(&self, token: &str, payload: &Value) -> Result<Value, FaceError> {
        self.calls.lock().unwrap().push(IdentityCall {
            token: token.to_string(),
            payload: payload.clone(),
        });

        match self.reply.lock().unwrap().clone() {
            IdentityReply::Success(body) => Ok(body),
            IdentityReply::Status { status, body } => Err(FaceError::Upstream {
                status,
                message: body,
            }),
            IdentityReply::Timeout => Err(FaceError::UpstreamTimeout),
            IdentityReply::Unreachable => Err(FaceError::UpstreamUnavailable),
        }
    }
}
