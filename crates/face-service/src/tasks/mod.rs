//! Background tasks for the face service.
//!
//! # Tasks
//!
//! - `key_rotator` - Rotates the signing key on a fixed interval

pub mod key_rotator;

pub use key_rotator::{KeyRotator, KeyRotatorHandle};
