//! Downloads WordPress collections page by page into the build directory.
//!
//! Pages are written verbatim as `page-0001.json`, `page-0002.json`, ...
//! under `<build>/wordpress/<collection>/`, so a transform can be re-run
//! without hitting the source again.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::WordPressConfig;
use crate::engine::persist::write_json;
use crate::error::{Error, Result};

/// Every collection the transform reads.
pub const COLLECTIONS: [&str; 4] = ["posts", "users", "categories", "media"];

const DEFAULT_PER_PAGE: u32 = 100;
const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

pub struct WordPressClient {
    http: reqwest::Client,
    base: String,
    per_page: u32,
}

impl WordPressClient {
    pub fn new(config: &WordPressConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base: config.api_url.trim_end_matches('/').to_string(),
            per_page: DEFAULT_PER_PAGE,
        })
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, DEFAULT_PER_PAGE);
        self
    }

    /// One page of a collection, and the total page count the server reports.
    pub async fn fetch_page(&self, collection: &str, page: u32) -> Result<(Vec<Value>, u32)> {
        let resp = self
            .http
            .get(format!("{}/{collection}", self.base))
            .query(&[("per_page", self.per_page), ("page", page)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::Source {
                status: status.as_u16(),
                message,
            });
        }

        let total_pages = resp
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let items = resp.json().await?;
        Ok((items, total_pages))
    }

    /// Download every page of `collection` into `dir`, replacing any pages
    /// an earlier download left there. Returns the item count.
    pub async fn download(&self, collection: &str, dir: &Path) -> Result<usize> {
        let stale = clear_pages(dir).await?;
        if stale > 0 {
            debug!(collection, stale, "removed pages from earlier download");
        }

        let mut page = 1;
        let mut total_pages = 1;
        let mut count = 0;

        while page <= total_pages {
            let (items, total) = self.fetch_page(collection, page).await?;
            total_pages = total;
            count += items.len();
            write_json(&dir.join(page_file(page)), &items).await?;
            debug!(collection, page, total_pages, "page downloaded");
            if items.is_empty() {
                break;
            }
            page += 1;
        }

        info!(collection, items = count, pages = total_pages, "collection downloaded");
        Ok(count)
    }
}

pub fn page_file(page: u32) -> String {
    format!("page-{page:04}.json")
}

/// Remove every page file in `dir`. A missing directory holds none.
pub async fn clear_pages(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("page-") && name.ends_with(".json") {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Raw shapes, only the fields the transform reads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WpUser {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WpCategory {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WpPost {
    pub id: u64,
    pub slug: String,
    pub date: String,
    pub title: Rendered,
    pub content: Rendered,
    #[serde(default)]
    pub excerpt: Option<Rendered>,
    pub author: u64,
    /// Zero when the post has no featured image.
    #[serde(default)]
    pub featured_media: u64,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default)]
    pub yoast_head_json: Option<YoastHead>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YoastHead {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WpMedia {
    pub id: u64,
    pub source_url: String,
    pub title: Rendered,
    #[serde(default)]
    pub alt_text: String,
}
