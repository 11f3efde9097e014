//! Credential token introspection for internal callers.
//!
//! Lets a trusted service check a credential token without fetching the
//! JWKS itself. Rejections are indistinguishable from one another.

use crate::errors::FaceError;
use crate::models::IntrospectRequest;
use crate::observability::metrics::record_error;
use crate::observability::ErrorCategory;
use crate::routes::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

/// POST /internal/tokens/verify
///
/// Returns `{"active": true, "claims": {...}}` for a valid token and 401
/// with the generic invalid-token message otherwise.
#[instrument(name = "face.token.introspect", skip_all, fields(status))]
pub async fn handle_introspect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IntrospectRequest>,
) -> Result<Json<Value>, FaceError> {
    match state.verifier.verify(&request.token) {
        Ok(claims) => {
            tracing::Span::current().record("status", "active");
            Ok(Json(json!({ "active": true, "claims": claims })))
        }
        Err(e) => {
            tracing::Span::current().record("status", "rejected");
            record_error(
                "introspect_token",
                ErrorCategory::from(&e).as_str(),
                e.status_code().as_u16(),
            );
            Err(e)
        }
    }
}
