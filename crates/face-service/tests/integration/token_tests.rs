//! Credential token issuing, verification and introspection.

use chrono::Utc;
use common::jwt::{TOKEN_AUDIENCE, TOKEN_ISSUER};
use face_service::errors::INVALID_TOKEN_MESSAGE;
use face_service::tokens::Rejection;
use face_test_utils::{
    assert_envelope, fixture_key_pair, TestFaceServer, TestTokenBuilder, TokenAssertions,
    TEST_INTERNAL_KEY,
};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;

fn claims(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

async fn introspect(server: &TestFaceServer, token: &str) -> Result<reqwest::Response, anyhow::Error> {
    Ok(reqwest::Client::new()
        .post(format!("{}/internal/tokens/verify", server.url()))
        .header("X-Internal-Key", TEST_INTERNAL_KEY)
        .json(&json!({ "token": token }))
        .send()
        .await?)
}

#[tokio::test]
async fn test_issue_then_verify_returns_supplied_and_injected_claims() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let supplied = claims(&[
        ("user_id", json!("u-42")),
        ("departmentId", json!("dept-7")),
        ("storeId", Value::Null),
    ]);

    let token = server.issuer().issue(supplied.clone(), Duration::from_secs(120))?;
    token.as_str().assert_credential_shape().assert_lifetime(120);

    let verified = server.verifier().verify(&token)?;
    assert_eq!(verified.iss, TOKEN_ISSUER);
    assert_eq!(verified.aud, TOKEN_AUDIENCE);
    assert_eq!(verified.exp - verified.iat, 120);
    assert_eq!(verified.extra, supplied);

    Ok(())
}

#[tokio::test]
async fn test_caller_cannot_override_registered_claims() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let supplied = claims(&[
        ("aud", json!("attacker")),
        ("iss", json!("attacker")),
        ("exp", json!(i64::MAX)),
    ]);

    let token = server.issuer().issue_default(supplied)?;
    token
        .as_str()
        .assert_claim("aud", TOKEN_AUDIENCE)
        .assert_claim("iss", TOKEN_ISSUER)
        .assert_lifetime(300);

    Ok(())
}

#[tokio::test]
async fn test_expired_token_stops_without_trying_other_key() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    server.key_store().rotate()?;
    let ring = server.key_store().snapshot();

    let token = TestTokenBuilder::new()
        .for_user("alice")
        .issued_at(Utc::now().timestamp() - 600)
        .expires_in(-60)
        .sign_with(ring.current())?;

    let verification = server.verifier().verify_detailed(&token);
    assert_eq!(verification.outcome.unwrap_err(), Rejection::Expired);
    assert_eq!(verification.attempts, 1);

    Ok(())
}

#[tokio::test]
async fn test_fallback_to_previous_key_on_signature_mismatch() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    server.key_store().rotate()?;
    let ring = server.key_store().snapshot();
    let previous = ring.previous().expect("previous key after rotation");

    // Signed by the previous key but labelled with the current kid.
    let token = TestTokenBuilder::new()
        .for_user("carol")
        .with_kid(ring.current().kid())
        .sign_with(previous)?;

    let verification = server.verifier().verify_detailed(&token);
    assert_eq!(verification.attempts, 2);
    assert_eq!(verification.outcome.unwrap().user_id(), Some("carol"));

    Ok(())
}

#[tokio::test]
async fn test_wrong_audience_with_single_key_fails() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let ring = server.key_store().snapshot();

    let token = TestTokenBuilder::new()
        .with_audience("some-other-service")
        .sign_with(ring.current())?;

    let verification = server.verifier().verify_detailed(&token);
    assert_eq!(verification.outcome.unwrap_err(), Rejection::NoMatchingKey);
    assert_eq!(verification.attempts, 1);

    Ok(())
}

#[tokio::test]
async fn test_wrong_issuer_fails() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let ring = server.key_store().snapshot();

    let token = TestTokenBuilder::new()
        .with_issuer("not-face-service")
        .sign_with(ring.current())?;

    assert!(server.verifier().verify(&token).is_err());

    Ok(())
}

#[tokio::test]
async fn test_unknown_key_is_rejected_with_generic_message() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    // Fixture key 3 is never drawn by a store that has not rotated.
    let rogue = fixture_key_pair(3, "rogue-kid")?;

    let token = TestTokenBuilder::new().for_user("mallory").sign_with(&rogue)?;
    let err = server.verifier().verify(&token).unwrap_err();
    assert_eq!(err.public_message(), INVALID_TOKEN_MESSAGE);

    // Claiming the real kid does not help.
    let token = TestTokenBuilder::new()
        .with_kid(&server.key_store().current_kid())
        .sign_with(&rogue)?;
    assert!(server.verifier().verify(&token).is_err());

    Ok(())
}

#[tokio::test]
async fn test_token_without_kid_tries_current_then_previous() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    server.key_store().rotate()?;
    let ring = server.key_store().snapshot();

    let token = TestTokenBuilder::new()
        .for_user("dave")
        .without_kid()
        .sign_with(ring.previous().expect("previous key"))?;

    let verification = server.verifier().verify_detailed(&token);
    assert!(verification.outcome.is_ok());
    assert_eq!(verification.attempts, 2);

    Ok(())
}

#[tokio::test]
async fn test_iat_beyond_clock_skew_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let ring = server.key_store().snapshot();
    let now = Utc::now().timestamp();

    let within = TestTokenBuilder::new()
        .issued_at(now + 60)
        .expires_at(now + 600)
        .sign_with(ring.current())?;
    assert!(server.verifier().verify(&within).is_ok());

    let beyond = TestTokenBuilder::new()
        .issued_at(now + 3600)
        .expires_at(now + 7200)
        .sign_with(ring.current())?;
    let verification = server.verifier().verify_detailed(&beyond);
    assert_eq!(verification.outcome.unwrap_err(), Rejection::IssuedInFuture);

    Ok(())
}

#[tokio::test]
async fn test_missing_exp_is_malformed() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let ring = server.key_store().snapshot();

    let token = TestTokenBuilder::new()
        .without_claim("exp")
        .sign_with(ring.current())?;

    let verification = server.verifier().verify_detailed(&token);
    assert_eq!(verification.outcome.unwrap_err(), Rejection::Malformed);

    Ok(())
}

#[tokio::test]
async fn test_hs256_token_is_refused() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let token = TestTokenBuilder::new()
        .with_kid(&server.key_store().current_kid())
        .sign_hs256(b"guessable-shared-secret")?;

    assert!(server.verifier().verify(&token).is_err());

    Ok(())
}

#[tokio::test]
async fn test_introspection_reports_active_token() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let token = server
        .issuer()
        .issue_default(claims(&[("user_id", json!("u-1"))]))?;

    let response = introspect(&server, &token).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["active"], true);
    assert_eq!(body["claims"]["user_id"], "u-1");
    assert_eq!(body["claims"]["aud"], TOKEN_AUDIENCE);

    Ok(())
}

#[tokio::test]
async fn test_introspection_rejections_are_indistinguishable() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let ring = server.key_store().snapshot();

    let expired = TestTokenBuilder::new()
        .issued_at(Utc::now().timestamp() - 600)
        .expires_in(-60)
        .sign_with(ring.current())?;
    let forged = TestTokenBuilder::new().sign_with(&fixture_key_pair(3, "rogue")?)?;

    for token in [expired.as_str(), forged.as_str(), "not-a-jwt"] {
        let response = introspect(&server, token).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body: Value = response.json().await?;
        assert_envelope(&body, 401, false);
        assert_eq!(body["message"], INVALID_TOKEN_MESSAGE);
    }

    Ok(())
}
