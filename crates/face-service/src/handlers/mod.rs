//! HTTP request handlers for the face service.

pub mod face_handler;
pub mod health;
pub mod jwks_handler;
pub mod metrics;
pub mod token_handler;

pub use face_handler::{handle_register_face, handle_verify_face};
pub use health::health_check;
pub use jwks_handler::{handle_get_jwks, handle_rotation_info};
pub use metrics::metrics_handler;
pub use token_handler::handle_introspect;
