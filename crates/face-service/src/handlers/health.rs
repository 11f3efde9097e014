//! Liveness probe.

use axum::Json;
use serde_json::{json, Value};

/// Returns `{"status":"ok"}` while the process is serving requests.
///
/// Does not check collaborators; a failing probe means the process is hung.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
