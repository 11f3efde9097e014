//! Utilities shared between the face service and its test tooling.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for credential token utilities (claims, limits, header inspection)
pub mod jwt;
