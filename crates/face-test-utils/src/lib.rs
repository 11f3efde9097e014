//! # Face Service Test Utilities
//!
//! Shared test utilities for the face service.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (pre-generated RSA keys, fixture key stores)
//! - Token builders for hand-crafted credential tokens (forged, expired,
//!   wrong audience, missing kid)
//! - In-memory collaborator mocks (embedder, face index, identity backend)
//! - Server test harness (`TestFaceServer` for E2E tests)
//! - Custom assertions (`TokenAssertions`, envelope checks)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use face_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestFaceServer::spawn().await?;
//!     let key = fixture_key_pair(3, "forged")?;
//!
//!     let token = TestTokenBuilder::new()
//!         .for_user("alice")
//!         .sign_with(&key)?;
//!
//!     assert!(server.verifier().verify(&token).is_err());
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod mocks;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use mocks::*;
pub use server_harness::*;
pub use token_builders::*;
