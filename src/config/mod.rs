//! Typed configuration from environment variables and an optional settings file.
//!
//! Loads once at startup. Each command asks only for the variables it
//! needs and fails fast if any of those are missing. The management
//! token is wrapped in secrecy::SecretString to prevent log leaks.
//! Pipeline tuning and content type IDs live in [`settings`].

pub mod secrets;
pub mod settings;

pub use settings::{ContentTypes, FixedEntries, PoolSettings, Settings};

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// Settings every command shares. Never fails: all have defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub build_dir: PathBuf,
    pub locale: String,
    pub settings_path: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Self {
        Self {
            build_dir: optional_var("BUILD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("dist")),
            locale: optional_var("CONTENTFUL_LOCALE").unwrap_or_else(|| "en-US".to_string()),
            settings_path: optional_var("MIGRATE_SETTINGS").map(PathBuf::from),
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}

/// Credentials and target of the destination space.
#[derive(Debug, Clone)]
pub struct ContentfulConfig {
    pub token: SecretString,
    pub space_id: String,
    pub environment: String,
}

impl ContentfulConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            token: SecretString::from(required_var("CONTENTFUL_CMA_TOKEN")?),
            space_id: required_var("CONTENTFUL_SPACE_ID")?,
            environment: optional_var("CONTENTFUL_ENV_NAME").unwrap_or_else(|| "master".to_string()),
        })
    }
}

/// Where to download source content from.
#[derive(Debug, Clone)]
pub struct WordPressConfig {
    /// REST root, e.g. `https://example.com/wp-json/wp/v2`.
    pub api_url: String,
}

impl WordPressConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: required_var("WP_API_URL")?,
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name)
        .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
}

// Empty values count as unset.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
