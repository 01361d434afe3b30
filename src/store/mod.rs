//! Destination record store: the async capability set the pipeline needs.
//!
//! [`ContentfulClient`] talks to the Content Management API over HTTP;
//! [`MemoryStore`] keeps everything in process for tests and dry runs.

pub mod contentful;
pub mod memory;

pub use contentful::ContentfulClient;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::model::{Fields, Record};

/// Largest page the destination will return.
pub const MAX_PAGE_SIZE: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Entry,
    Asset,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Entry => "Entry",
            RecordKind::Asset => "Asset",
        }
    }
}

/// A paginated search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: RecordKind,
    pub content_type: Option<String>,
    /// Raw search parameters, e.g. `("fields.slug[match]", "tax-day")`.
    pub filters: Vec<(String, String)>,
    pub skip: u64,
    pub limit: u64,
}

impl Query {
    pub fn entries(content_type: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::Entry,
            content_type: Some(content_type.into()),
            filters: Vec::new(),
            skip: 0,
            limit: MAX_PAGE_SIZE,
        }
    }

    pub fn assets() -> Self {
        Self {
            kind: RecordKind::Asset,
            content_type: None,
            filters: Vec::new(),
            skip: 0,
            limit: MAX_PAGE_SIZE,
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    pub fn page(mut self, skip: u64, limit: u64) -> Self {
        self.skip = skip;
        self.limit = limit.min(MAX_PAGE_SIZE);
        self
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &str {
        self.content_type.as_deref().unwrap_or("asset")
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub items: Vec<Record>,
}

/// The destination record store.
///
/// Calls are not rate limited here; callers pace them through
/// [`crate::engine::RateGate`].
#[async_trait]
pub trait RecordService: Send + Sync {
    async fn query(&self, query: &Query) -> Result<Page>;

    /// Create a draft entry.
    async fn create_entry(&self, content_type: &str, fields: Fields) -> Result<Record>;

    /// Replace an existing record's fields.
    async fn update(&self, record: &Record, fields: Fields) -> Result<Record>;

    /// Make a record live.
    async fn publish(&self, record: &Record) -> Result<Record>;

    async fn unpublish(&self, record: &Record) -> Result<Record>;

    async fn delete(&self, record: &Record) -> Result<()>;

    /// Create a draft asset pointing at an upload URL.
    async fn create_asset(&self, fields: Fields) -> Result<Record>;

    /// Ingest an asset's binary for `locale`; returns the processed asset.
    async fn process_asset(&self, asset: &Record, locale: &str) -> Result<Record>;
}
