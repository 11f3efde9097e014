use crate::models::{Jwks, RotationInfo};
use crate::observability::metrics::record_jwks_request;
use crate::routes::AppState;
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handle JWKS request
///
/// GET /internal/jwks
///
/// Returns the current key and, within one rotation of a change, the
/// previous key. Consumers may cache the set for a minute; a rotation only
/// adds a key, so a cached set keeps verifying tokens from the old key.
#[instrument(name = "face.jwks.get", skip_all, fields(key_count))]
pub async fn handle_get_jwks(State(state): State<Arc<AppState>>) -> (HeaderMap, Json<Jwks>) {
    let jwks = state.jwks.public_key_set();

    tracing::Span::current().record("key_count", jwks.keys.len());
    record_jwks_request(jwks.keys.len());

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=60"));

    (headers, Json(jwks))
}

/// GET /internal/keys/rotation
#[instrument(name = "face.keys.rotation_info", skip_all)]
pub async fn handle_rotation_info(State(state): State<Arc<AppState>>) -> Json<RotationInfo> {
    Json(state.jwks.rotation_info())
}
