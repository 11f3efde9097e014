#![no_main]

use common::jwt::peek_kid;
use face_service::keys::fixtures::FixtureKeySource;
use face_service::keys::KeyStore;
use face_service::tokens::TokenVerifier;
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

// One rotated store shared across runs so both candidate keys are live.
fn verifier() -> Option<&'static TokenVerifier> {
    static VERIFIER: OnceLock<Option<TokenVerifier>> = OnceLock::new();
    VERIFIER
        .get_or_init(|| {
            let store = KeyStore::new(Arc::new(FixtureKeySource::new()), Duration::from_secs(900))
                .ok()?;
            store.rotate().ok()?;
            Some(TokenVerifier::new(Arc::new(store), Duration::from_secs(300)))
        })
        .as_ref()
}

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    // Header parsing must never panic, whatever the input.
    let _ = peek_kid(token);

    if let Some(verifier) = verifier() {
        let verification = verifier.verify_detailed(token);
        // Random input never carries a valid signature from a fixture key.
        assert!(verification.outcome.is_err());
        assert!(verification.attempts <= 2);
    }
});
