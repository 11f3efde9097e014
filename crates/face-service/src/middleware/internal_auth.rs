//! Shared-key authentication for internal routes.
//!
//! Internal callers present the service key in `X-Internal-Key`. The
//! presented and configured keys are compared as HMAC-SHA256 tags so the
//! comparison time does not depend on how much of the key matched.

use crate::errors::FaceError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use common::secret::{ExposeSecret, SecretString};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, instrument};

type HmacSha256 = Hmac<Sha256>;

pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

const TAG_CONTEXT: &[u8] = b"face-service/internal-key/v1";

/// State for the internal key middleware.
#[derive(Clone)]
pub struct InternalKeyState {
    expected_tag: Vec<u8>,
}

impl InternalKeyState {
    pub fn new(internal_key: &SecretString) -> Result<Self, FaceError> {
        let expected_tag = tag(internal_key.expose_secret().as_bytes())?
            .finalize()
            .into_bytes()
            .to_vec();

        Ok(Self { expected_tag })
    }

    fn accepts(&self, presented: &[u8]) -> bool {
        match tag(presented) {
            Ok(mac) => mac.verify_slice(&self.expected_tag).is_ok(),
            Err(_) => false,
        }
    }
}

fn tag(key: &[u8]) -> Result<HmacSha256, FaceError> {
    let mut mac = HmacSha256::new_from_slice(TAG_CONTEXT)
        .map_err(|e| FaceError::Crypto(format!("HMAC init failed: {e}")))?;
    mac.update(key);
    Ok(mac)
}

/// Reject requests without the correct internal service key.
///
/// # Response
///
/// - Returns 401 Unauthorized if the header is missing or wrong
/// - Continues to the next handler otherwise
#[instrument(skip_all, name = "face.middleware.internal_auth")]
pub async fn require_internal_key(
    State(state): State<Arc<InternalKeyState>>,
    req: Request,
    next: Next,
) -> Result<Response, FaceError> {
    let presented = req
        .headers()
        .get(INTERNAL_KEY_HEADER)
        .map(|value| value.as_bytes())
        .ok_or_else(|| {
            debug!(target: "face.middleware.auth", "Missing internal key header");
            FaceError::Unauthorized
        })?;

    if !state.accepts(presented) {
        debug!(target: "face.middleware.auth", "Internal key mismatch");
        return Err(FaceError::Unauthorized);
    }

    Ok(next.run(req).await)
}
