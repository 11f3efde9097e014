//! Metrics definitions for the face service
//!
//! All metrics follow Prometheus naming conventions:
//! - `face_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: 2 values (success, error)
//! - `reason`: bounded by [`crate::tokens::Rejection`] (malformed, expired, iat, no_matching_key)
//! - `error_category`: 4 values (authentication, validation, upstream, internal)
//! - `endpoint`: known routes only, everything else is `/other`
//! - `operation` / `outcome`: bounded by code

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the render handle for `/metrics`.
///
/// Must be called once, before any metric is recorded.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("face_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Signing is a single RS256 operation, sub-millisecond granularity matters
        .set_buckets_for_metric(
            Matcher::Prefix("face_token_issuance".to_string()),
            &[0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("face_upstream_request".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set upstream request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `face_token_issuance_duration_seconds`, `face_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &str, duration: Duration) {
    histogram!("face_token_issuance_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("face_token_issuance_total", "status" => status.to_string()).increment(1);
}

/// Record token validation result
///
/// Metric: `face_token_validations_total`
/// Labels: `status`, `reason`
pub fn record_token_validation(status: &str, reason: Option<&str>) {
    let reason = reason.unwrap_or("none");
    counter!("face_token_validations_total", "status" => status.to_string(), "reason" => reason.to_string())
        .increment(1);
}

/// Record one signature check against a candidate public key
///
/// Metric: `face_token_verification_attempts_total`
pub fn record_verification_attempt() {
    counter!("face_token_verification_attempts_total").increment(1);
}

// ============================================================================
// Key Management Metrics
// ============================================================================

/// Record key rotation event
///
/// Metric: `face_key_rotation_total`
/// Labels: `status`
pub fn record_key_rotation(status: &str) {
    counter!("face_key_rotation_total", "status" => status.to_string()).increment(1);
}

/// Update active signing keys count (1 before the first rotation, 2 after)
///
/// Metric: `face_active_signing_keys`
#[allow(clippy::cast_precision_loss)]
pub fn set_active_signing_keys(count: usize) {
    gauge!("face_active_signing_keys").set(count as f64);
}

/// Record key rotation last success timestamp
///
/// Metric: `face_key_rotation_last_success_timestamp`
#[allow(clippy::cast_precision_loss)]
pub fn set_key_rotation_last_success(timestamp_secs: i64) {
    gauge!("face_key_rotation_last_success_timestamp").set(timestamp_secs as f64);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a public key set request
///
/// Metric: `face_jwks_requests_total`
/// Labels: `key_count`
pub fn record_jwks_request(key_count: usize) {
    counter!("face_jwks_requests_total", "key_count" => key_count.to_string()).increment(1);
}

// ============================================================================
// Face Flow Metrics
// ============================================================================

/// Record the outcome of a verify or register flow
///
/// Metric: `face_operations_total`
/// Labels: `operation` (verify, register), `outcome`
pub fn record_face_operation(operation: &str, outcome: &str) {
    counter!("face_operations_total", "operation" => operation.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

/// Record a call to an external collaborator
///
/// Metric: `face_upstream_request_duration_seconds`, `face_upstream_requests_total`
/// Labels: `upstream` (embedder, vector_db, identity), `status`
pub fn record_upstream_request(upstream: &str, status: &str, duration: Duration) {
    histogram!("face_upstream_request_duration_seconds", "upstream" => upstream.to_string())
        .record(duration.as_secs_f64());

    counter!("face_upstream_requests_total", "upstream" => upstream.to_string(), "status" => status.to_string())
        .increment(1);
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `face_http_requests_total`, `face_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("face_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("face_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Record an error returned to a client
///
/// Metric: `face_errors_total`
/// Labels: `operation`, `error_category`, `status_code`
pub fn record_error(operation: &str, error_category: &str, status_code: u16) {
    counter!("face_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Every route is static, so anything unknown collapses into one label value.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/verify-face" => "/api/verify-face",
        "/api/register-face" => "/api/register-face",
        "/internal/jwks" => "/internal/jwks",
        "/internal/keys/rotation" => "/internal/keys/rotation",
        "/internal/tokens/verify" => "/internal/tokens/verify",
        _ => "/other",
    }
}
