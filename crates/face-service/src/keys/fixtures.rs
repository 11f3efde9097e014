//! Deterministic key source for tests.
//!
//! Generating RSA-2048 keys takes long enough to dominate a test suite, so
//! tests draw from four pre-generated PKCS#8 keys instead. The source cycles
//! through them in order; a fresh source always starts at the first key.

use super::KeySource;
use crate::errors::FaceError;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const FIXTURE_KEY_PEMS: [&str; 4] = [
    include_str!("fixtures/fixture_key_1.pem"),
    include_str!("fixtures/fixture_key_2.pem"),
    include_str!("fixtures/fixture_key_3.pem"),
    include_str!("fixtures/fixture_key_4.pem"),
];

#[derive(Debug, Default)]
pub struct FixtureKeySource {
    next: AtomicUsize,
}

impl FixtureKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the cycle at `index` (mod 4).
    pub fn starting_at(index: usize) -> Self {
        Self {
            next: AtomicUsize::new(index),
        }
    }

    /// Parse fixture key `index` (mod 4) without advancing any source.
    pub fn key(index: usize) -> Result<RsaPrivateKey, FaceError> {
        let pem = FIXTURE_KEY_PEMS
            .get(index % FIXTURE_KEY_PEMS.len())
            .ok_or_else(|| FaceError::Internal("fixture index out of range".to_string()))?;

        RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| FaceError::Crypto(format!("Invalid fixture key: {e}")))
    }
}

impl KeySource for FixtureKeySource {
    fn generate(&self) -> Result<RsaPrivateKey, FaceError> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        Self::key(index)
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
