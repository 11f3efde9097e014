use crate::keys::{KeyPair, KeyStore};
use crate::models::{JsonWebKey, Jwks, RotationInfo};
use std::sync::Arc;

/// Publishes the verification half of every live signing generation.
#[derive(Clone)]
pub struct JwksPublisher {
    store: Arc<KeyStore>,
}

impl JwksPublisher {
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self { store }
    }

    /// Current key first, then previous when present (RFC 7517).
    ///
    /// Built from one snapshot, so a concurrent rotation yields either the
    /// old pair or the new pair.
    pub fn public_key_set(&self) -> Jwks {
        let ring = self.store.snapshot();

        Jwks {
            keys: ring.keys().map(|key| to_jwk(key)).collect(),
        }
    }

    pub fn rotation_info(&self) -> RotationInfo {
        self.store.rotation_info()
    }
}

fn to_jwk(key: &KeyPair) -> JsonWebKey {
    JsonWebKey {
        kty: "RSA".to_string(),
        alg: "RS256".to_string(),
        use_: "sig".to_string(),
        kid: key.kid().to_string(),
        n: key.modulus_b64(),
        e: key.exponent_b64(),
    }
}
