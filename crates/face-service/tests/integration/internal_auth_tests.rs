//! Internal key enforcement on `/internal` routes.

use face_test_utils::{assert_envelope, TestFaceServer, TEST_INTERNAL_KEY};
use reqwest::StatusCode;

const INTERNAL_PATHS: [&str; 2] = ["/internal/jwks", "/internal/keys/rotation"];

#[tokio::test]
async fn test_missing_internal_key_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let client = reqwest::Client::new();

    for path in INTERNAL_PATHS {
        let response = client.get(format!("{}{path}", server.url())).send().await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");

        let body: serde_json::Value = response.json().await?;
        assert_envelope(&body, 401, false);
    }

    Ok(())
}

#[tokio::test]
async fn test_wrong_internal_key_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let client = reqwest::Client::new();

    let near_miss = format!("{TEST_INTERNAL_KEY}x");
    for key in ["wrong", near_miss.as_str(), ""] {
        let response = client
            .get(format!("{}/internal/jwks", server.url()))
            .header("X-Internal-Key", key)
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "key {key:?}");
    }

    Ok(())
}

#[tokio::test]
async fn test_correct_internal_key_is_accepted() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let client = reqwest::Client::new();

    for path in INTERNAL_PATHS {
        let response = server.internal_get(&client, path).send().await?;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    Ok(())
}

#[tokio::test]
async fn test_introspection_requires_internal_key() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/internal/tokens/verify", server.url()))
        .json(&serde_json::json!({ "token": "anything" }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_public_routes_do_not_require_internal_key() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
