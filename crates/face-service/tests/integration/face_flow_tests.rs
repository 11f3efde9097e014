//! Face verification and registration over HTTP with mocked collaborators.

use face_service::services::face_auth_service::face_point_id;
use face_test_utils::{
    assert_envelope, live_face, spoofed_face, test_config_with, IdentityReply, MockFaceIndex,
    TestCollaborators, TestFaceServer, TokenAssertions, TEST_USER_EMAIL, TEST_USER_ID,
};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;

fn image_part() -> Part {
    Part::bytes(b"\xff\xd8\xff\xe0 fake jpeg".to_vec()).file_name("face.jpg")
}

fn registration_form() -> Form {
    Form::new()
        .part("image", image_part())
        .text("firstName", "Ada")
        .text("lastName", "Lovelace")
        .text("email", TEST_USER_EMAIL)
        .text("position", "Engineer")
        .text("departmentId", "dept-7")
        .text("timeLogged", "2024-05-01T08:30:00+00:00")
}

async fn post_form(
    server: &TestFaceServer,
    path: &str,
    form: Form,
) -> Result<(StatusCode, Value), anyhow::Error> {
    let response = reqwest::Client::new()
        .post(format!("{}{path}", server.url()))
        .multipart(form)
        .send()
        .await?;
    let status = response.status();
    let body: Value = response.json().await?;
    assert_envelope(&body, status.as_u16(), status.is_success());
    Ok((status, body))
}

async fn verify(server: &TestFaceServer) -> Result<(StatusCode, Value), anyhow::Error> {
    post_form(server, "/api/verify-face", Form::new().part("image", image_part())).await
}

// ============================================================================
// POST /api/verify-face
// ============================================================================

#[tokio::test]
async fn test_verify_match_returns_token_for_user() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn_with(TestCollaborators {
        face_index: Arc::new(MockFaceIndex::matching("user-5", None)),
        ..Default::default()
    })
    .await?;

    let (status, body) = verify(&server).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Face verified successfully");
    assert_eq!(body["data"]["user_id"], "user-5");

    let token = body["data"]["jwt_token"].as_str().expect("token in data");
    token
        .assert_credential_shape()
        .assert_signed_by(&server.key_store().current_kid())
        .assert_claim("user_id", "user-5");

    let claims = server.verifier().verify(token)?;
    assert_eq!(claims.user_id(), Some("user-5"));

    Ok(())
}

#[tokio::test]
async fn test_verify_without_match_is_not_found() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let (status, body) = verify(&server).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No match found. Please register your face.");

    Ok(())
}

#[tokio::test]
async fn test_verify_face_checks() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let cases = [
        (
            vec![],
            "Unable to detect face, ensure the face and camera is clear",
        ),
        (vec![live_face(), live_face()], "Multiple faces detected"),
        (vec![spoofed_face()], "Face is not real, please try again."),
    ];

    for (faces, message) in cases {
        server.embedder().set_faces(faces);
        let (status, body) = verify(&server).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], message);
    }

    Ok(())
}

#[tokio::test]
async fn test_verify_without_image_is_bad_request() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let (status, body) = post_form(
        &server,
        "/api/verify-face",
        Form::new().text("note", "no picture"),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No image provided");
    assert_eq!(server.embedder().calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_verify_index_failure_is_generic_500() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    server.face_index().set_failing(true);

    let (status, body) = verify(&server).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Something went wrong. Please try again.");

    Ok(())
}

// ============================================================================
// POST /api/register-face
// ============================================================================

#[tokio::test]
async fn test_register_forwards_signed_token_and_stores_face() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;

    let (status, body) = post_form(&server, "/api/register-face", registration_form()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Face registered successfully");
    assert_eq!(body["data"]["user"]["id"], TEST_USER_ID);

    let calls = server.identity().calls();
    assert_eq!(calls.len(), 1);
    let call = calls.first().expect("one backend call");
    assert_eq!(call.payload["email"], TEST_USER_EMAIL);
    assert_eq!(call.payload["storeId"], Value::Null);

    let claims = server.verifier().verify(&call.token)?;
    assert_eq!(claims.get("email"), Some(&Value::from(TEST_USER_EMAIL)));
    assert_eq!(claims.get("departmentId"), Some(&Value::from("dept-7")));

    let upserts = server.face_index().upserts();
    let record = upserts.first().expect("face stored");
    assert_eq!(record.id, face_point_id(TEST_USER_ID));
    assert_eq!(record.user_id, TEST_USER_ID);
    assert_eq!(record.email, TEST_USER_EMAIL);
    assert_eq!(record.registered_at, "2024-05-01T08:30:00+00:00");

    Ok(())
}

#[tokio::test]
async fn test_register_duplicate_face_is_rejected() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn_with(TestCollaborators {
        face_index: Arc::new(MockFaceIndex::matching("user-1", Some(TEST_USER_EMAIL))),
        ..Default::default()
    })
    .await?;

    let (status, body) = post_form(&server, "/api/register-face", registration_form()).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Face already registered. Please login instead or use a different email."
    );
    assert!(server.identity().calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_register_same_face_different_email_proceeds() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn_with(TestCollaborators {
        face_index: Arc::new(MockFaceIndex::matching("user-1", Some("other@example.com"))),
        ..Default::default()
    })
    .await?;

    let (status, _) = post_form(&server, "/api/register-face", registration_form()).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_register_face_checks() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let cases = [
        (
            vec![],
            "No face detected. Please ensure your face is clearly visible.",
        ),
        (
            vec![live_face(), live_face()],
            "Multiple faces detected. Please ensure only one face is in the image.",
        ),
        (
            vec![spoofed_face()],
            "Liveness check failed. Please use a real face, not a photo or video.",
        ),
    ];

    for (faces, message) in cases {
        server.embedder().set_faces(faces);
        let (status, body) = post_form(&server, "/api/register-face", registration_form()).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], message);
    }
    assert!(server.identity().calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_register_missing_field_is_bad_request() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    let form = Form::new()
        .part("image", image_part())
        .text("firstName", "Ada")
        .text("lastName", "Lovelace")
        .text("position", "Engineer")
        .text("departmentId", "dept-7")
        .text("timeLogged", "2024-05-01T08:30:00+00:00");

    let (status, body) = post_form(&server, "/api/register-face", form).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing field: email");

    Ok(())
}

#[tokio::test]
async fn test_register_backend_status_passes_through() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    server.identity().set_reply(IdentityReply::Status {
        status: 409,
        body: "Email already exists".to_string(),
    });

    let (status, body) = post_form(&server, "/api/register-face", registration_form()).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already exists");
    assert!(server.face_index().upserts().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_register_backend_timeout_is_gateway_timeout() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    server.identity().set_reply(IdentityReply::Timeout);

    let (status, body) = post_form(&server, "/api/register-face", registration_form()).await?;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        body["message"],
        "Registration service is unavailable. Please try again later."
    );

    Ok(())
}

#[tokio::test]
async fn test_register_backend_unreachable_is_500() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn().await?;
    server.identity().set_reply(IdentityReply::Unreachable);

    let (status, body) = post_form(&server, "/api/register-face", registration_form()).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to connect to auth service");

    Ok(())
}

// ============================================================================
// Per-client rate limit
// ============================================================================

#[tokio::test]
async fn test_face_routes_are_rate_limited_per_client() -> Result<(), anyhow::Error> {
    let server = TestFaceServer::spawn_with_config(
        test_config_with(&[("RATE_LIMIT_PER_MINUTE", "2")])?,
        TestCollaborators::default(),
    )
    .await?;

    for _ in 0..2 {
        let (status, _) = verify(&server).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (status, body) = post_form(&server, "/api/register-face", registration_form()).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["message"], "Too many requests. Please try again later.");
    assert!(server.identity().calls().is_empty());

    // Only the face endpoints share the budget.
    let health = reqwest::get(format!("{}/health", server.url())).await?;
    assert_eq!(health.status(), StatusCode::OK);

    Ok(())
}
