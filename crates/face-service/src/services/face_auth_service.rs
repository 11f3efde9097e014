//! Face verification and registration flows.
//!
//! Both flows embed the uploaded image, require exactly one live face, and
//! consult the face index. Verification hands a matched user a credential
//! token; registration forwards the user to the identity backend under a
//! credential token and then stores the embedding.

use crate::errors::FaceError;
use crate::models::{FaceEmbedding, FaceRecord, FaceRegisterRequest};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_face_operation;
use crate::services::embedding_client::FaceEmbedder;
use crate::services::identity_client::IdentityBackend;
use crate::services::qdrant_client::FaceIndex;
use crate::tokens::TokenIssuer;
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Rejection messages for one flow.
struct FaceChecks {
    no_face: &'static str,
    multiple_faces: &'static str,
    not_live: &'static str,
}

const VERIFY_CHECKS: FaceChecks = FaceChecks {
    no_face: "Unable to detect face, ensure the face and camera is clear",
    multiple_faces: "Multiple faces detected",
    not_live: "Face is not real, please try again.",
};

const REGISTER_CHECKS: FaceChecks = FaceChecks {
    no_face: "No face detected. Please ensure your face is clearly visible.",
    multiple_faces: "Multiple faces detected. Please ensure only one face is in the image.",
    not_live: "Liveness check failed. Please use a real face, not a photo or video.",
};

/// Data returned to a user whose face matched.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedFace {
    pub jwt_token: String,
    pub user_id: String,
}

#[derive(Clone)]
pub struct FaceAuthService {
    embedder: Arc<dyn FaceEmbedder>,
    face_index: Arc<dyn FaceIndex>,
    identity: Arc<dyn IdentityBackend>,
    issuer: TokenIssuer,
    match_threshold: f32,
}

impl FaceAuthService {
    pub fn new(
        embedder: Arc<dyn FaceEmbedder>,
        face_index: Arc<dyn FaceIndex>,
        identity: Arc<dyn IdentityBackend>,
        issuer: TokenIssuer,
        match_threshold: f32,
    ) -> Self {
        Self {
            embedder,
            face_index,
            identity,
            issuer,
            match_threshold,
        }
    }

    #[instrument(skip_all, name = "face.auth.verify")]
    pub async fn verify_face(&self, image: Bytes) -> Result<VerifiedFace, FaceError> {
        let result = self.verify_inner(image).await;
        record_face_operation("verify", outcome(&result));
        result
    }

    async fn verify_inner(&self, image: Bytes) -> Result<VerifiedFace, FaceError> {
        let face = single_live_face(self.embedder.embed(image).await?, &VERIFY_CHECKS)?;

        let matched = self
            .face_index
            .find_match(&face.embedding, self.match_threshold)
            .await?
            .ok_or(FaceError::NoMatch)?;
        let user_id = matched.user_id.ok_or_else(|| {
            warn!(target: "face.auth", "Matched face has no user_id in its payload");
            FaceError::NoMatch
        })?;

        let mut claims = Map::new();
        claims.insert("user_id".to_string(), Value::from(user_id.as_str()));
        let jwt_token = self.issuer.issue_default(claims)?;

        info!(
            target: "face.auth",
            user = %hash_for_correlation(&user_id),
            score = matched.score,
            "Face verified"
        );

        Ok(VerifiedFace { jwt_token, user_id })
    }

    /// Register a new face. Returns the identity backend's response.
    #[instrument(skip_all, name = "face.auth.register")]
    pub async fn register_face(
        &self,
        request: FaceRegisterRequest,
        image: Bytes,
    ) -> Result<Value, FaceError> {
        let result = self.register_inner(request, image).await;
        record_face_operation("register", outcome(&result));
        result
    }

    async fn register_inner(
        &self,
        request: FaceRegisterRequest,
        image: Bytes,
    ) -> Result<Value, FaceError> {
        let face = single_live_face(self.embedder.embed(image).await?, &REGISTER_CHECKS)?;

        let existing = self
            .face_index
            .find_match(&face.embedding, self.match_threshold)
            .await?;
        if existing.is_some_and(|m| m.email.as_deref() == Some(request.email.as_str())) {
            info!(
                target: "face.auth",
                email = %hash_for_correlation(&request.email),
                "Registration rejected: face already registered"
            );
            return Err(FaceError::AlreadyRegistered);
        }

        let payload = request.to_backend_payload();
        let token = self.issuer.issue_default(payload.clone())?;
        let response = self
            .identity
            .register_face(&token, &Value::Object(payload))
            .await?;

        let (user_id, email) = registered_user(&response)?;
        self.face_index
            .upsert(FaceRecord {
                id: face_point_id(&user_id),
                embedding: face.embedding,
                user_id: user_id.clone(),
                email,
                registered_at: request.time_logged.to_rfc3339(),
            })
            .await?;

        info!(
            target: "face.auth",
            user = %hash_for_correlation(&user_id),
            "Face registered"
        );

        Ok(response)
    }
}

/// Vector database point id for a user: UUIDv5 in the DNS namespace.
pub fn face_point_id(user_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, user_id.as_bytes())
}

fn single_live_face(
    faces: Vec<FaceEmbedding>,
    checks: &FaceChecks,
) -> Result<FaceEmbedding, FaceError> {
    let mut faces = faces.into_iter();
    let face = match (faces.next(), faces.next()) {
        (None, _) => return Err(FaceError::FaceRejected(checks.no_face.to_string())),
        (Some(face), None) => face,
        (Some(_), Some(_)) => {
            return Err(FaceError::FaceRejected(checks.multiple_faces.to_string()))
        }
    };

    if !face.is_real {
        return Err(FaceError::FaceRejected(checks.not_live.to_string()));
    }
    Ok(face)
}

/// Pull `user.id` and `user.email` out of the identity backend response.
fn registered_user(response: &Value) -> Result<(String, String), FaceError> {
    let user = response.get("user");
    let id = user.and_then(|u| u.get("id")).and_then(|id| match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let email = user
        .and_then(|u| u.get("email"))
        .and_then(Value::as_str)
        .map(str::to_string);

    match (id, email) {
        (Some(id), Some(email)) => Ok((id, email)),
        _ => {
            warn!(target: "face.auth", "Identity backend response missing user id or email");
            Err(FaceError::Internal(
                "identity backend response missing user".to_string(),
            ))
        }
    }
}

fn outcome<T>(result: &Result<T, FaceError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(FaceError::FaceRejected(_)) => "rejected",
        Err(FaceError::NoMatch) => "no_match",
        Err(FaceError::AlreadyRegistered) => "duplicate",
        Err(_) => "error",
    }
}
