//! Face verification and registration endpoints.
//!
//! Both take `multipart/form-data` with the picture in the `image` field.
//! Every response, success or failure, uses the [`ApiResponse`] envelope.

use crate::errors::FaceError;
use crate::models::{ApiResponse, FaceRegisterRequest};
use crate::observability::metrics::record_error;
use crate::observability::ErrorCategory;
use crate::routes::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    Json,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

const IMAGE_FIELD: &str = "image";

/// Multipart body split into the image and the text fields.
#[derive(Debug, Default)]
struct FaceForm {
    image: Option<Bytes>,
    fields: HashMap<String, String>,
}

impl FaceForm {
    async fn read(mut multipart: Multipart) -> Result<Self, FaceError> {
        let mut form = FaceForm::default();

        while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == IMAGE_FIELD {
                form.image = Some(field.bytes().await.map_err(invalid_form)?);
            } else {
                let value = field.text().await.map_err(invalid_form)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    fn into_image(self) -> Result<(Bytes, HashMap<String, String>), FaceError> {
        match self.image {
            Some(image) if !image.is_empty() => Ok((image, self.fields)),
            _ => Err(FaceError::BadRequest("No image provided".to_string())),
        }
    }
}

fn invalid_form(e: MultipartError) -> FaceError {
    debug!(target: "face.handlers.face", error = %e, "Rejected multipart body");
    FaceError::BadRequest("Invalid multipart form data".to_string())
}

fn record_failure(operation: &str, e: &FaceError) {
    record_error(
        operation,
        ErrorCategory::from(e).as_str(),
        e.status_code().as_u16(),
    );
}

/// POST /api/verify-face
///
/// On a match returns 200 with `{jwt_token, user_id}`; the token is a
/// credential token carrying `user_id`.
#[instrument(name = "face.api.verify_face", skip_all, fields(status))]
pub async fn handle_verify_face(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ApiResponse>, FaceError> {
    let result = async {
        let (image, _) = FaceForm::read(multipart).await?.into_image()?;
        let verified = state.face_auth.verify_face(image).await?;
        serde_json::to_value(verified)
            .map_err(|e| FaceError::Internal(format!("response serialization failed: {e}")))
    }
    .await;

    match result {
        Ok(data) => {
            tracing::Span::current().record("status", "success");
            Ok(Json(ApiResponse::ok("Face verified successfully", data)))
        }
        Err(e) => {
            tracing::Span::current().record("status", "error");
            record_failure("verify_face", &e);
            Err(e)
        }
    }
}

/// POST /api/register-face
///
/// Text fields: `firstName`, `lastName`, `email`, `position`,
/// `departmentId`, `timeLogged` (RFC 3339) and optional `storeId`. Returns
/// the identity backend's response as `data`.
#[instrument(name = "face.api.register_face", skip_all, fields(status))]
pub async fn handle_register_face(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ApiResponse>, FaceError> {
    let result = async {
        let (image, fields) = FaceForm::read(multipart).await?.into_image()?;
        let request = FaceRegisterRequest::from_form(fields)?;
        state.face_auth.register_face(request, image).await
    }
    .await;

    match result {
        Ok(data) => {
            tracing::Span::current().record("status", "success");
            Ok(Json(ApiResponse::ok("Face registered successfully", data)))
        }
        Err(e) => {
            tracing::Span::current().record("status", "error");
            record_failure("register_face", &e);
            Err(e)
        }
    }
}
