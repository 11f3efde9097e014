use axum::http::StatusCode;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::errors::FaceError;

/// Response envelope used by every `/api` endpoint and every error.
///
/// The HTTP status of the response always equals `statusCode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub message: String,
    pub success: bool,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            message: message.into(),
            success: true,
            status_code: StatusCode::OK.as_u16(),
            data: Some(data),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
            status_code: status.as_u16(),
            data: None,
        }
    }
}

/// JWKS response (RFC 7517)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<JsonWebKey>,
}

/// RSA JSON Web Key (RFC 7517 / RFC 7518 section 6.3)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    pub kty: String, // "RSA"
    pub alg: String, // "RS256"
    #[serde(rename = "use")]
    pub use_: String, // "sig"
    pub kid: String,
    pub n: String, // modulus, base64url without padding
    pub e: String, // exponent, base64url without padding
}

/// Rotation status served to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationInfo {
    pub last_rotation: DateTime<Utc>,
    pub next_rotation: DateTime<Utc>,
    pub current_kid: String,
    pub previous_kid: Option<String>,
    pub rotation_interval_minutes: f64,
}

/// Token introspection request from a trusted internal caller.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectRequest {
    pub token: String,
}

/// One detected face from the embedding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceEmbedding {
    pub embedding: Vec<f32>,
    pub is_real: bool,
}

/// Best match above threshold from the vector database.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub score: f32,
    pub user_id: Option<String>,
    pub email: Option<String>,
}

/// A point to upsert into the vector database.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRecord {
    pub id: uuid::Uuid,
    pub embedding: Vec<f32>,
    pub user_id: String,
    pub email: String,
    pub registered_at: String,
}

/// Registration form fields (multipart, alongside the image).
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: String,
    pub department_id: String,
    pub store_id: Option<String>,
    pub time_logged: DateTime<FixedOffset>,
}

impl FaceRegisterRequest {
    /// Build from multipart text fields, keyed by their camelCase form names.
    pub fn from_form(mut fields: HashMap<String, String>) -> Result<Self, FaceError> {
        let mut required = |name: &str| {
            fields
                .remove(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| FaceError::BadRequest(format!("Missing field: {name}")))
        };

        let first_name = required("firstName")?;
        let last_name = required("lastName")?;
        let email = required("email")?;
        let position = required("position")?;
        let department_id = required("departmentId")?;
        let time_logged_raw = required("timeLogged")?;

        let time_logged = DateTime::parse_from_rfc3339(time_logged_raw.trim()).map_err(|_| {
            FaceError::BadRequest("Invalid timeLogged, expected an RFC 3339 timestamp".to_string())
        })?;

        let store_id = fields
            .remove("storeId")
            .filter(|value| !value.trim().is_empty());

        Ok(Self {
            first_name,
            last_name,
            email,
            position,
            department_id,
            store_id,
            time_logged,
        })
    }

    /// JSON body forwarded to the identity backend; also the claims of the
    /// credential token that accompanies it.
    pub fn to_backend_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("firstName".to_string(), Value::from(self.first_name.as_str()));
        payload.insert("lastName".to_string(), Value::from(self.last_name.as_str()));
        payload.insert("email".to_string(), Value::from(self.email.as_str()));
        payload.insert("position".to_string(), Value::from(self.position.as_str()));
        payload.insert(
            "departmentId".to_string(),
            Value::from(self.department_id.as_str()),
        );
        payload.insert("storeId".to_string(), Value::from(self.store_id.clone()));
        payload.insert(
            "timeLogged".to_string(),
            Value::from(self.time_logged.to_rfc3339()),
        );
        payload
    }
}
