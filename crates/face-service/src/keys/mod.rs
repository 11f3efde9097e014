//! Signing key material.
//!
//! A [`KeyPair`] is one RSA-2048 signing generation identified by its `kid`.
//! The [`KeyStore`] holds the current and (after the first rotation) previous
//! generation. New private keys come from a [`KeySource`], chosen once at
//! startup from the deployment environment.

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;
pub mod store;

pub use store::{KeyRing, KeyStore};

use crate::config::Environment;
use crate::errors::FaceError;
use chrono::{DateTime, Utc};
use common::jwt::encode_rsa_component;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use rand::RngCore;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Modulus size for every generated signing key.
pub const RSA_KEY_BITS: usize = 2048;

const KID_PREFIX: &str = "face-service";

/// Produces fresh RSA private keys for the key store.
pub trait KeySource: Send + Sync {
    fn generate(&self) -> Result<RsaPrivateKey, FaceError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Generates keys in process with the OS-seeded thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalKeySource;

impl KeySource for LocalKeySource {
    fn generate(&self) -> Result<RsaPrivateKey, FaceError> {
        RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
            .map_err(|e| FaceError::Crypto(format!("RSA key generation failed: {e}")))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Production key source. Keys must come from a KMS/HSM integration, which
/// does not exist yet, so every call fails and startup aborts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalKeySource;

impl KeySource for ExternalKeySource {
    fn generate(&self) -> Result<RsaPrivateKey, FaceError> {
        Err(FaceError::Configuration(
            "External key source is not configured; production refuses locally generated signing keys"
                .to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

/// Select the key source for a deployment environment.
pub fn key_source_for(environment: Environment) -> Arc<dyn KeySource> {
    if environment.is_production() {
        Arc::new(ExternalKeySource)
    } else {
        Arc::new(LocalKeySource)
    }
}

/// Key id: `face-service-<UTC yyyymmddHHMMSS>-<8 random hex>`.
pub(crate) fn generate_kid(created_at: DateTime<Utc>) -> String {
    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);

    format!(
        "{KID_PREFIX}-{}-{}",
        created_at.format("%Y%m%d%H%M%S"),
        hex::encode(suffix)
    )
}

/// One signing generation. The private half never leaves this type.
pub struct KeyPair {
    kid: String,
    created_at: DateTime<Utc>,
    public_key: RsaPublicKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl KeyPair {
    pub fn from_private_key(
        private_key: &RsaPrivateKey,
        kid: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, FaceError> {
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| FaceError::Crypto(format!("PKCS#1 encoding failed: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let public_key = private_key.to_public_key();
        let decoding_key = DecodingKey::from_rsa_components(
            &encode_rsa_component(&public_key.n().to_bytes_be()),
            &encode_rsa_component(&public_key.e().to_bytes_be()),
        )
        .map_err(|e| FaceError::Crypto(format!("Invalid RSA public components: {e}")))?;

        Ok(Self {
            kid,
            created_at,
            public_key,
            encoding_key,
            decoding_key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Base64url (no padding) big-endian modulus, as published in the JWK.
    pub fn modulus_b64(&self) -> String {
        encode_rsa_component(&self.public_key.n().to_bytes_be())
    }

    /// Base64url (no padding) big-endian public exponent.
    pub fn exponent_b64(&self) -> String {
        encode_rsa_component(&self.public_key.e().to_bytes_be())
    }

    /// RS256 header carrying this generation's kid.
    pub fn header(&self) -> Header {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        header
    }

    /// Sign `claims` with this generation's private key under `header`.
    pub fn sign<T: Serialize>(&self, header: &Header, claims: &T) -> Result<String, FaceError> {
        jsonwebtoken::encode(header, claims, &self.encoding_key)
            .map_err(|e| FaceError::Crypto(format!("Token signing failed: {e}")))
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .field("created_at", &self.created_at)
            .field("private_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
