//! Pipeline tuning and destination schema IDs, loaded from TOML.
//!
//! ```toml
//! [pipeline]
//! concurrency = 8
//! api_delay_ms = 1000
//! upload_timeout_secs = 60
//!
//! [stages.posts]
//! upload_timeout_secs = 300
//!
//! [content_types]
//! article = "articlePage"
//!
//! [entries]
//! layout = "2ny5cu75sVPNSFxcrqSBKu"
//! ```
//!
//! Every key is optional.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PoolSettings,
    pub stages: HashMap<String, StageOverride>,
    pub content_types: ContentTypes,
    pub entries: FixedEntries,
}

impl Default for Settings {
    fn default() -> Self {
        let mut stages = HashMap::new();
        // Article creation links a dozen references; it needs the longer deadline.
        stages.insert(
            "posts".to_string(),
            StageOverride {
                upload_timeout_secs: Some(300),
                ..StageOverride::default()
            },
        );
        Self {
            pipeline: PoolSettings::default(),
            stages,
            content_types: ContentTypes::default(),
            entries: FixedEntries::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read settings {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(content)?;
        // Built-in overrides fill whatever keys the file leaves out.
        for (stage, builtin) in Settings::default().stages {
            let over = settings.stages.entry(stage).or_default();
            *over = over.clone().or(builtin);
        }
        Ok(settings)
    }

    /// Effective pool settings for a stage: pipeline defaults plus overrides.
    pub fn pool_for(&self, stage: &str) -> PoolSettings {
        let mut pool = self.pipeline.clone();
        if let Some(over) = self.stages.get(stage) {
            if let Some(n) = over.concurrency {
                pool.concurrency = n;
            }
            if let Some(ms) = over.api_delay_ms {
                pool.api_delay_ms = ms;
            }
            if let Some(secs) = over.upload_timeout_secs {
                pool.upload_timeout_secs = secs;
            }
        }
        pool
    }
}

/// Worker pool and rate gate tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum items in flight at once.
    pub concurrency: usize,
    /// Pause before every destination call.
    pub api_delay_ms: u64,
    /// How long to wait for one item before classifying it failed.
    pub upload_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        // 8 workers with a 1s pause stay under a 10 req/s quota.
        Self {
            concurrency: 8,
            api_delay_ms: 1000,
            upload_timeout_secs: 60,
        }
    }
}

impl PoolSettings {
    pub fn api_delay(&self) -> Duration {
        Duration::from_millis(self.api_delay_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageOverride {
    pub concurrency: Option<usize>,
    pub api_delay_ms: Option<u64>,
    pub upload_timeout_secs: Option<u64>,
}

impl StageOverride {
    /// Keys set here win; unset keys come from `fallback`.
    pub fn or(self, fallback: StageOverride) -> Self {
        Self {
            concurrency: self.concurrency.or(fallback.concurrency),
            api_delay_ms: self.api_delay_ms.or(fallback.api_delay_ms),
            upload_timeout_secs: self.upload_timeout_secs.or(fallback.upload_timeout_secs),
        }
    }
}

/// Destination content type IDs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentTypes {
    pub asset: String,
    pub author: String,
    pub link: String,
    pub topic: String,
    pub article: String,
    pub rich_text: String,
    pub publish_date: String,
    pub main_title: String,
    pub summary: String,
    pub title_image: String,
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self {
            asset: "asset".to_string(),
            author: "author".to_string(),
            link: "link".to_string(),
            topic: "relatedTopics".to_string(),
            article: "articlePage".to_string(),
            rich_text: "richTextMarkdown".to_string(),
            publish_date: "publishDate".to_string(),
            main_title: "mainTitle".to_string(),
            summary: "summary".to_string(),
            title_image: "titleImage".to_string(),
        }
    }
}

/// Pre-existing entries that articles link to unconditionally.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FixedEntries {
    pub layout: Option<String>,
    pub cta_bottom: Option<String>,
}
