//! Current/previous signing key storage with atomic rotation.
//!
//! Readers take a [`KeyRing`] snapshot: an immutable `Arc` that is swapped
//! whole on rotation. A reader therefore sees either the complete pre-rotation
//! pair or the complete post-rotation pair, never a mix. Rotations themselves
//! are serialized so that `created_at` is monotonic across generations.

use super::{generate_kid, KeyPair, KeySource};
use crate::errors::FaceError;
use crate::models::RotationInfo;
use crate::observability::metrics::{
    record_key_rotation, set_active_signing_keys, set_key_rotation_last_success,
};
use chrono::{DateTime, Utc};
use rsa::RsaPublicKey;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{error, info, instrument};

/// Immutable view of the signing keys at one point in time.
#[derive(Debug)]
pub struct KeyRing {
    current: Arc<KeyPair>,
    previous: Option<Arc<KeyPair>>,
    last_rotation_at: DateTime<Utc>,
}

impl KeyRing {
    pub fn current(&self) -> &Arc<KeyPair> {
        &self.current
    }

    pub fn previous(&self) -> Option<&Arc<KeyPair>> {
        self.previous.as_ref()
    }

    /// When the store was created or last rotated.
    pub fn last_rotation_at(&self) -> DateTime<Utc> {
        self.last_rotation_at
    }

    /// Current first, then previous if present.
    pub fn keys(&self) -> impl Iterator<Item = &Arc<KeyPair>> {
        std::iter::once(&self.current).chain(self.previous.iter())
    }

    pub fn contains_kid(&self, kid: &str) -> bool {
        self.keys().any(|key| key.kid() == kid)
    }
}

pub struct KeyStore {
    source: Arc<dyn KeySource>,
    rotation_interval: Duration,
    ring: Mutex<Arc<KeyRing>>,
    rotation_lock: Mutex<()>,
}

impl KeyStore {
    /// Create the store with one freshly generated current key.
    ///
    /// Fails if the key source cannot produce a key; the caller must treat
    /// that as fatal.
    pub fn new(source: Arc<dyn KeySource>, rotation_interval: Duration) -> Result<Self, FaceError> {
        let created_at = Utc::now();
        let private_key = source.generate().map_err(|e| {
            error!(target: "face.keys", source = source.name(), error = %e, "Initial key generation failed");
            e
        })?;
        let current = KeyPair::from_private_key(&private_key, generate_kid(created_at), created_at)?;

        info!(
            target: "face.keys",
            kid = %current.kid(),
            source = source.name(),
            "Initial signing key generated"
        );
        set_active_signing_keys(1);

        Ok(Self {
            source,
            rotation_interval,
            ring: Mutex::new(Arc::new(KeyRing {
                current: Arc::new(current),
                previous: None,
                last_rotation_at: created_at,
            })),
            rotation_lock: Mutex::new(()),
        })
    }

    fn lock_ring(&self) -> MutexGuard<'_, Arc<KeyRing>> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a consistent ring.
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consistent view of current and previous keys.
    pub fn snapshot(&self) -> Arc<KeyRing> {
        Arc::clone(&self.lock_ring())
    }

    pub fn current_public(&self) -> RsaPublicKey {
        self.snapshot().current.public_key().clone()
    }

    pub fn previous_public(&self) -> Option<RsaPublicKey> {
        self.snapshot()
            .previous
            .as_ref()
            .map(|key| key.public_key().clone())
    }

    /// The generation new tokens are signed with.
    pub fn current_signing_key(&self) -> Arc<KeyPair> {
        Arc::clone(&self.snapshot().current)
    }

    pub fn current_kid(&self) -> String {
        self.snapshot().current.kid().to_string()
    }

    pub fn previous_kid(&self) -> Option<String> {
        self.snapshot()
            .previous
            .as_ref()
            .map(|key| key.kid().to_string())
    }

    pub fn rotation_interval(&self) -> Duration {
        self.rotation_interval
    }

    /// Generate a new current key and demote the old current to previous.
    ///
    /// The old previous is evicted. On failure the store is left untouched.
    /// Returns the new current kid.
    #[instrument(skip_all, name = "face.keys.rotate")]
    pub fn rotate(&self) -> Result<String, FaceError> {
        let _rotation = self
            .rotation_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match self.rotate_locked() {
            Ok(kid) => {
                record_key_rotation("success");
                Ok(kid)
            }
            Err(e) => {
                record_key_rotation("error");
                error!(target: "face.keys", source = self.source.name(), error = %e, "Key rotation failed");
                Err(e)
            }
        }
    }

    fn rotate_locked(&self) -> Result<String, FaceError> {
        let before = self.snapshot();
        let private_key = self.source.generate()?;

        // Wall clock may step backwards; a generation never predates its parent.
        let created_at = Utc::now().max(before.current.created_at());

        let mut kid = generate_kid(created_at);
        while before.contains_kid(&kid) {
            kid = generate_kid(created_at);
        }

        let current = Arc::new(KeyPair::from_private_key(&private_key, kid, created_at)?);
        let evicted = before.previous.as_ref().map(|key| key.kid().to_string());

        let next = Arc::new(KeyRing {
            current: Arc::clone(&current),
            previous: Some(Arc::clone(&before.current)),
            last_rotation_at: created_at,
        });
        *self.lock_ring() = next;

        info!(
            target: "face.keys",
            new_kid = %current.kid(),
            previous_kid = %before.current.kid(),
            evicted_kid = evicted.as_deref().unwrap_or("none"),
            "Signing key rotated"
        );
        set_active_signing_keys(2);
        set_key_rotation_last_success(created_at.timestamp());

        Ok(current.kid().to_string())
    }

    /// Rotation status derived from one snapshot.
    pub fn rotation_info(&self) -> RotationInfo {
        let ring = self.snapshot();
        let interval = chrono::Duration::from_std(self.rotation_interval)
            .unwrap_or_else(|_| chrono::Duration::zero());

        RotationInfo {
            last_rotation: ring.last_rotation_at,
            next_rotation: ring.last_rotation_at + interval,
            current_kid: ring.current.kid().to_string(),
            previous_kid: ring.previous.as_ref().map(|key| key.kid().to_string()),
            rotation_interval_minutes: self.rotation_interval.as_secs_f64() / 60.0,
        }
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.snapshot();
        f.debug_struct("KeyStore")
            .field("source", &self.source.name())
            .field("current_kid", &ring.current.kid())
            .field("previous_kid", &ring.previous.as_ref().map(|key| key.kid()))
            .field("rotation_interval", &self.rotation_interval)
            .finish()
    }
}
