use crate::models::ApiResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// The only message a client ever sees for a rejected credential token.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

const UNEXPECTED_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum FaceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing or invalid internal service key")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A face check failed; the message is shown to the user as is.
    #[error("Face rejected: {0}")]
    FaceRejected(String),

    #[error("No matching face found")]
    NoMatch,

    #[error("Face already registered")]
    AlreadyRegistered,

    #[error("Too many requests from client")]
    RateLimited,

    /// The identity backend answered with a non-success status.
    #[error("Identity backend returned {status}")]
    Upstream { status: u16, message: String },

    #[error("Identity backend timed out")]
    UpstreamTimeout,

    #[error("Identity backend unreachable")]
    UpstreamUnavailable,

    #[error("Vector database error: {0}")]
    FaceIndex(String),

    #[error("Embedding service error: {0}")]
    Embedding(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FaceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FaceError::InvalidToken(_) | FaceError::Unauthorized => StatusCode::UNAUTHORIZED,
            FaceError::BadRequest(_) | FaceError::FaceRejected(_) | FaceError::AlreadyRegistered => {
                StatusCode::BAD_REQUEST
            }
            FaceError::NoMatch => StatusCode::NOT_FOUND,
            FaceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            FaceError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            FaceError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            FaceError::UpstreamUnavailable
            | FaceError::FaceIndex(_)
            | FaceError::Embedding(_)
            | FaceError::Configuration(_)
            | FaceError::Crypto(_)
            | FaceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            FaceError::InvalidToken(_) => INVALID_TOKEN_MESSAGE.to_string(),
            FaceError::Unauthorized => "Invalid or missing internal service key".to_string(),
            FaceError::BadRequest(message)
            | FaceError::FaceRejected(message)
            | FaceError::Upstream { message, .. } => message.clone(),
            FaceError::NoMatch => "No match found. Please register your face.".to_string(),
            FaceError::AlreadyRegistered => {
                "Face already registered. Please login instead or use a different email."
                    .to_string()
            }
            FaceError::RateLimited => "Too many requests. Please try again later.".to_string(),
            FaceError::UpstreamTimeout => {
                "Registration service is unavailable. Please try again later.".to_string()
            }
            FaceError::UpstreamUnavailable => "Failed to connect to auth service".to_string(),
            FaceError::FaceIndex(_)
            | FaceError::Embedding(_)
            | FaceError::Configuration(_)
            | FaceError::Crypto(_)
            | FaceError::Internal(_) => UNEXPECTED_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for FaceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiResponse::error(status, self.public_message());

        (status, Json(body)).into_response()
    }
}
