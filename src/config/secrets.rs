//! Secret handling utilities.
//!
//! Re-exports secrecy types and adds the bearer header helper used by the
//! destination client.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

/// Format a management token as an `Authorization` header value.
pub fn bearer(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}
