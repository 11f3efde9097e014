//! Observability for the face service
//!
//! # Privacy by Default
//!
//! Instrumented functions use `#[instrument(skip_all)]` and allow-list their
//! fields explicitly. Fields fall into three groups:
//! - **SAFE**: logged in plaintext (key ids, outcomes, counts)
//! - **HASHED**: SHA-256 prefix for correlation (user ids, emails)
//! - **NEVER**: tokens, private keys, the internal service key, embeddings

pub mod metrics;

use crate::errors::FaceError;
use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// This is a one-way correlation aid, not a protection for secrets.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.get(..4).unwrap_or_default())
}

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid credentials (tokens, internal key)
    Authentication,
    /// Rejected input (bad form data, face checks)
    Validation,
    /// Client exceeded its request budget
    RateLimited,
    /// A collaborator failed or timed out
    Upstream,
    /// Crypto, configuration or unexpected failures
    Internal,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Validation => "validation",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::Upstream => "upstream",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&FaceError> for ErrorCategory {
    fn from(err: &FaceError) -> Self {
        match err {
            FaceError::InvalidToken(_) | FaceError::Unauthorized => ErrorCategory::Authentication,
            FaceError::BadRequest(_)
            | FaceError::FaceRejected(_)
            | FaceError::NoMatch
            | FaceError::AlreadyRegistered => ErrorCategory::Validation,
            FaceError::RateLimited => ErrorCategory::RateLimited,
            FaceError::Upstream { .. }
            | FaceError::UpstreamTimeout
            | FaceError::UpstreamUnavailable
            | FaceError::FaceIndex(_)
            | FaceError::Embedding(_) => ErrorCategory::Upstream,
            FaceError::Crypto(_) | FaceError::Configuration(_) | FaceError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }
}
