//! Credential token issuance and verification.
//!
//! Tokens are RS256 JWTs signed with the key store's current generation and
//! carry `iss`, `aud`, `iat` and `exp` plus caller-supplied claims. The
//! header `kid` names the signing generation; verification accepts tokens
//! signed by the current or previous generation.

pub mod issuer;
pub mod verifier;

pub use issuer::TokenIssuer;
pub use verifier::{Rejection, TokenVerifier, Verification};
