//! Periodic signing key rotation.
//!
//! The rotator sleeps for one rotation interval, rotates the key store, and
//! repeats until cancelled. A failed rotation is logged and counted; the
//! current keys stay in service and the next attempt happens one interval
//! later.
//!
//! # Graceful Shutdown
//!
//! Cancellation interrupts the sleep immediately. A rotation already in
//! progress runs to completion before the task exits.

use crate::keys::KeyStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

pub struct KeyRotator {
    store: Arc<KeyStore>,
    interval: Duration,
}

impl KeyRotator {
    /// Rotator using the store's configured interval.
    pub fn new(store: Arc<KeyStore>) -> Self {
        let interval = store.rotation_interval();
        Self { store, interval }
    }

    /// Spawn the rotation loop on the current runtime.
    pub fn start(self) -> KeyRotatorHandle {
        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(
            self.run(cancel_token.clone())
                .instrument(tracing::info_span!("face.rotator")),
        );

        KeyRotatorHandle { cancel_token, task }
    }

    /// Run the rotation loop until `cancel_token` is cancelled.
    pub async fn run(self, cancel_token: CancellationToken) {
        info!(
            target: "face.rotator",
            interval_secs = self.interval.as_secs(),
            "Key rotator started"
        );

        loop {
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {
                    self.rotate_once().await;
                }
                () = cancel_token.cancelled() => {
                    info!(target: "face.rotator", "Key rotator received shutdown signal, exiting");
                    break;
                }
            }
        }
    }

    async fn rotate_once(&self) {
        let store = Arc::clone(&self.store);

        // RSA key generation is CPU-bound; keep it off the async workers.
        match tokio::task::spawn_blocking(move || store.rotate()).await {
            Ok(Ok(kid)) => {
                debug!(target: "face.rotator", kid = %kid, "Scheduled rotation complete");
            }
            Ok(Err(e)) => {
                error!(
                    target: "face.rotator",
                    error = %e,
                    retry_in_secs = self.interval.as_secs(),
                    "Scheduled rotation failed, keeping current keys"
                );
            }
            Err(e) => {
                error!(target: "face.rotator", error = %e, "Rotation task did not complete");
            }
        }
    }
}

/// Owns a running rotator task.
pub struct KeyRotatorHandle {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl KeyRotatorHandle {
    /// Token that stops the rotator when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the rotator and wait for it to exit.
    pub async fn stop(self) {
        self.cancel_token.cancel();
        if let Err(e) = self.task.await {
            warn!(target: "face.rotator", error = %e, "Key rotator task ended abnormally");
        }
    }
}
