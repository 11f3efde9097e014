//! HTTP middleware for the face service.
//!
//! # Components
//!
//! - `internal_auth` - Shared-key check for `/internal` routes
//! - `rate_limit` - Per-client request budget for `/api` routes
//! - `http_metrics` - HTTP request metrics (outermost layer)

pub mod http_metrics;
pub mod internal_auth;
pub mod rate_limit;

pub use http_metrics::http_metrics_middleware;
pub use internal_auth::{require_internal_key, InternalKeyState, INTERNAL_KEY_HEADER};
pub use rate_limit::{rate_limit, RateLimiter};
