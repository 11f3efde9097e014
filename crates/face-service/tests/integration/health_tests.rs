//! Health, metrics and fallback route tests.

use face_test_utils::TestFaceServer;
use reqwest::StatusCode;

#[tokio::test]
async fn test_health_returns_ok_status() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({ "status": "ok" }));

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_not_found() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let response = reqwest::get(format!("{}/api/does-not-exist", server.url())).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_wrong_method_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let response = reqwest::get(format!("{}/api/verify-face", server.url())).await?;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    Ok(())
}
