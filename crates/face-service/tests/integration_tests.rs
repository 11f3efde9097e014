//! Integration tests for the face service
//!
//! This is the top-level integration test harness that Cargo discovers.
//! Test modules are organized in the integration/ subdirectory.

#[path = "integration/key_rotation_tests.rs"]
mod key_rotation_tests;

#[path = "integration/health_tests.rs"]
mod health_tests;

#[path = "integration/token_tests.rs"]
mod token_tests;

#[path = "integration/internal_auth_tests.rs"]
mod internal_auth_tests;

#[path = "integration/face_flow_tests.rs"]
mod face_flow_tests;
