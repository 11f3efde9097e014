//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across the face service. Use them for
//! the internal service key, the vector database API key, and any signed
//! credential token held longer than a single function call.
//!
//! `SecretBox<T>` and `SecretString` implement `Debug` with redaction, so a
//! config struct deriving `Debug` can be logged safely. Values are zeroized
//! on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct BackendSettings {
//!     api_url: String,
//!     internal_key: SecretString,
//! }
//!
//! let settings = BackendSettings {
//!     api_url: "http://core:8080".to_string(),
//!     internal_key: SecretString::from("shared-secret"),
//! };
//!
//! assert!(!format!("{settings:?}").contains("shared-secret"));
//! assert_eq!(settings.internal_key.expose_secret(), "shared-secret");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
