//! Business logic and collaborator clients.
//!
//! # Components
//!
//! - `key_management_service` - Public key set and rotation status
//! - `face_auth_service` - Face verification and registration flows
//! - `embedding_client` - Face embedding sidecar
//! - `qdrant_client` - Vector database face index
//! - `identity_client` - Downstream identity backend

pub mod embedding_client;
pub mod face_auth_service;
pub mod identity_client;
pub mod key_management_service;
pub mod qdrant_client;

pub use embedding_client::{EmbeddingClient, FaceEmbedder};
pub use face_auth_service::{FaceAuthService, VerifiedFace};
pub use identity_client::{IdentityBackend, IdentityClient};
pub use key_management_service::JwksPublisher;
pub use qdrant_client::{FaceIndex, QdrantFaceIndex};
