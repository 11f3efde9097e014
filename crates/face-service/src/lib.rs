//! Face Identity Service Library
//!
//! Matches faces against a vector index and hands matched or newly
//! registered users to the core identity service with short-lived RS256
//! credential tokens. Signing keys live only in memory and rotate on a
//! fixed interval; the previous key stays verifiable for one interval.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `keys` - Signing key generations and the key store
//! - `tokens` - Credential token issuing and verification
//! - `tasks` - Background key rotation
//! - `services` - Face flows, public key set, collaborator clients
//! - `handlers` / `routes` / `middleware` - HTTP surface
//! - `errors` / `models` / `observability` - Shared types and telemetry

pub mod config;
pub mod errors;
pub mod handlers;
pub mod keys;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod tasks;
pub mod tokens;
