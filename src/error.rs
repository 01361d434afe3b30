//! Error types for wpcf-migrate.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("destination rejected request ({status}): {message}")]
    Destination { status: u16, message: String },

    #[error("source returned {status}: {message}")]
    Source { status: u16, message: String },

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad settings file: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a re-run of the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout(_) => true,
            Error::Destination { status, .. } | Error::Source { status, .. } => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
