//! Deterministic cryptographic fixtures for testing
//!
//! RSA-2048 generation is slow, so fixtures come from the four PKCS#8 keys
//! bundled with the face service. The same index always yields the same key.

use chrono::{DateTime, Utc};
use face_service::errors::FaceError;
use face_service::keys::fixtures::FixtureKeySource;
use face_service::keys::{KeyPair, KeyStore};
use rsa::RsaPrivateKey;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Fixture setup failed: {0}")]
    Setup(#[from] FaceError),

    #[error("Token construction failed: {0}")]
    Token(String),
}

/// Rotation interval for fixture stores; long enough that nothing rotates
/// unless a test asks for it.
pub const FIXTURE_ROTATION_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Fixture private key `index` (mod 4).
pub fn fixture_private_key(index: usize) -> Result<RsaPrivateKey, FixtureError> {
    Ok(FixtureKeySource::key(index)?)
}

/// Key generation built from fixture key `index` under an arbitrary kid.
///
/// Useful for signing tokens the key store never issued.
pub fn fixture_key_pair(index: usize, kid: &str) -> Result<KeyPair, FixtureError> {
    fixture_key_pair_at(index, kid, Utc::now())
}

pub fn fixture_key_pair_at(
    index: usize,
    kid: &str,
    created_at: DateTime<Utc>,
) -> Result<KeyPair, FixtureError> {
    let private_key = fixture_private_key(index)?;
    Ok(KeyPair::from_private_key(
        &private_key,
        kid.to_string(),
        created_at,
    )?)
}

/// Key store backed by the fixture keys, starting at key 0.
///
/// Each rotation draws the next fixture key, so a fresh store cycles
/// 0, 1, 2, 3, 0, ...
pub fn fixture_key_store() -> Result<Arc<KeyStore>, FixtureError> {
    fixture_key_store_with_interval(FIXTURE_ROTATION_INTERVAL)
}

pub fn fixture_key_store_with_interval(interval: Duration) -> Result<Arc<KeyStore>, FixtureError> {
    Ok(Arc::new(KeyStore::new(
        Arc::new(FixtureKeySource::new()),
        interval,
    )?))
}
