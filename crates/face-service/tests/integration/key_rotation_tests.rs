//! Key rotation as seen through the public key set and the verifier.
//!
//! A token stays verifiable for exactly one rotation after the key that
//! signed it was replaced.

use face_test_utils::{TestFaceServer, TokenAssertions};
use reqwest::StatusCode;
use serde_json::{Map, Value};

fn user_claims(user_id: &str) -> Map<String, Value> {
    let mut claims = Map::new();
    claims.insert("user_id".to_string(), Value::from(user_id));
    claims
}

async fn fetch_jwks(server: &TestFaceServer) -> Result<Value, anyhow::Error> {
    let response = server
        .internal_get(&reqwest::Client::new(), "/internal/jwks")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("max-age=60")
    );
    Ok(response.json().await?)
}

fn kids(jwks: &Value) -> Vec<String> {
    jwks["keys"]
        .as_array()
        .map(|keys| {
            keys.iter()
                .filter_map(|k| k["kid"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_jwks_has_one_key_after_startup() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let jwks = fetch_jwks(&server).await?;
    assert_eq!(kids(&jwks), vec![server.key_store().current_kid()]);

    let key = &jwks["keys"][0];
    assert_eq!(key["kty"], "RSA");
    assert_eq!(key["alg"], "RS256");
    assert_eq!(key["use"], "sig");
    assert_eq!(key["e"], "AQAB");
    assert!(key["n"].as_str().is_some_and(|n| !n.contains('=')));

    Ok(())
}

#[tokio::test]
async fn test_jwks_has_current_then_previous_after_rotation() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let original = server.key_store().current_kid();

    let rotated = server.key_store().rotate()?;

    let jwks = fetch_jwks(&server).await?;
    assert_eq!(kids(&jwks), vec![rotated.clone(), original.clone()]);
    assert_ne!(rotated, original);

    Ok(())
}

#[tokio::test]
async fn test_jwks_drops_oldest_key_after_second_rotation() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let original = server.key_store().current_kid();

    let second = server.key_store().rotate()?;
    let third = server.key_store().rotate()?;

    let published = kids(&fetch_jwks(&server).await?);
    assert_eq!(published, vec![third, second]);
    assert!(!published.contains(&original));

    Ok(())
}

#[tokio::test]
async fn test_token_survives_exactly_one_rotation() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let original_kid = server.key_store().current_kid();

    let token = server.issuer().issue_default(user_claims("alice"))?;
    token.as_str().assert_credential_shape().assert_signed_by(&original_kid);

    server.key_store().rotate()?;
    let claims = server.verifier().verify(&token)?;
    assert_eq!(claims.user_id(), Some("alice"));

    server.key_store().rotate()?;
    assert!(server.verifier().verify(&token).is_err());

    Ok(())
}

#[tokio::test]
async fn test_new_tokens_use_the_new_key() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let rotated = server.key_store().rotate()?;
    let token = server.issuer().issue_default(user_claims("bob"))?;

    token.as_str().assert_signed_by(&rotated);
    assert!(server.verifier().verify(&token).is_ok());

    Ok(())
}

#[tokio::test]
async fn test_rotation_info_endpoint() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let client = reqwest::Client::new();

    let before: Value = server
        .internal_get(&client, "/internal/keys/rotation")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(before["current_kid"], server.key_store().current_kid());
    assert!(before["previous_kid"].is_null());
    assert_eq!(before["rotation_interval_minutes"], 15.0);

    let original = server.key_store().current_kid();
    server.key_store().rotate()?;

    let after: Value = server
        .internal_get(&client, "/internal/keys/rotation")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(after["previous_kid"], original);
    assert_eq!(after["current_kid"], server.key_store().current_kid());

    Ok(())
}
