//! Chaos tests for key rotation under concurrent load
//!
//! Rotation swaps the whole key ring at once, so every token issued during
//! a rotation carries a kid that is live afterwards, and readers never see
//! a half-rotated ring.

use face_service::tokens::{TokenIssuer, TokenVerifier};
use face_test_utils::fixture_key_store;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn claims(n: usize) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert("user_id".to_string(), Value::from(format!("user-{n}")));
    claims
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issue_during_rotation_yields_verifiable_tokens(
) -> Result<(), anyhow::Error> {
    let store = fixture_key_store()?;
    let issuer = TokenIssuer::new(Arc::clone(&store), Duration::from_secs(300));
    let verifier = TokenVerifier::new(Arc::clone(&store), Duration::from_secs(300));

    let mut handles = Vec::with_capacity(101);
    for n in 0..100 {
        let issuer = issuer.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            issuer.issue_default(claims(n)).map(Some)
        }));
        if n == 50 {
            let store = Arc::clone(&store);
            handles.push(tokio::task::spawn_blocking(move || store.rotate().map(|_| None)));
        }
    }

    let mut tokens = Vec::new();
    for handle in handles {
        if let Some(token) = handle.await?? {
            tokens.push(token);
        }
    }
    assert_eq!(tokens.len(), 100);

    let live_kids: HashSet<String> = store
        .snapshot()
        .keys()
        .map(|key| key.kid().to_string())
        .collect();
    assert_eq!(live_kids.len(), 2);

    for token in &tokens {
        let header = jsonwebtoken::decode_header(token)?;
        let kid = header.kid.expect("issued tokens carry a kid");
        assert!(live_kids.contains(&kid), "kid {kid} missing from key set");
        assert!(verifier.verify(token).is_ok());
    }

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotations_leave_two_distinct_keys() -> Result<(), anyhow::Error> {
    let store = fixture_key_store()?;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::task::spawn_blocking(move || store.rotate())
        })
        .collect();

    let mut rotated = HashSet::new();
    for handle in handles {
        rotated.insert(handle.await??);
    }
    assert_eq!(rotated.len(), 8, "every rotation produces a fresh kid");

    let ring = store.snapshot();
    let previous = ring.previous().expect("previous key after rotations");
    assert_ne!(ring.current().kid(), previous.kid());
    assert!(previous.created_at() <= ring.current().created_at());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_verification_during_rotation_never_sees_partial_ring(
) -> Result<(), anyhow::Error> {
    let store = fixture_key_store()?;
    let issuer = TokenIssuer::new(Arc::clone(&store), Duration::from_secs(300));
    let verifier = TokenVerifier::new(Arc::clone(&store), Duration::from_secs(300));

    // Issued before any rotation below; stays valid through one rotation.
    let token = issuer.issue_default(claims(0))?;

    let rotator = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || store.rotate())
    };

    let checks: Vec<_> = (0..50)
        .map(|_| {
            let verifier = verifier.clone();
            let token = token.clone();
            tokio::task::spawn_blocking(move || verifier.verify(&token).is_ok())
        })
        .collect();

    rotator.await??;
    for check in checks {
        assert!(check.await?, "token must verify before and after one rotation");
    }

    Ok(())
}
