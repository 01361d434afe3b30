//! Media files: upload the binary as a destination asset, then wrap it in
//! an `asset` entry that posts can link to.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::engine::{ExistingIndex, KeyField, StageContext, Uploader};
use crate::error::Result;
use crate::model::items::{AssetItem, AssetLink};
use crate::model::{FailureKind, Fields, ItemError, ItemResult, Link, Outcome, Record, Step, WorkItem};

pub const INPUT: &str = "assets.json";

pub struct AssetUploader {
    ctx: StageContext,
    /// Wrapping entries by title.
    entries: ExistingIndex,
    /// Binary assets by file name.
    files: ExistingIndex,
}

impl AssetUploader {
    pub async fn prepare(ctx: StageContext) -> Result<Self> {
        let entries = ctx
            .entry_index(&ctx.content_types.asset, &KeyField::field("title"))
            .await?;
        let files = ctx
            .asset_index(&KeyField::nested("file", "fileName"))
            .await?;
        Ok(Self {
            ctx,
            entries,
            files,
        })
    }

    /// The published binary for `item`, uploading it if absent.
    async fn resolve_file(&self, key: &str, item: &AssetItem) -> std::result::Result<Record, ItemError> {
        if let Some(existing) = self.files.get(item.file_name()) {
            debug!(key, file = item.file_name(), "binary already uploaded");
            return Ok(existing.clone());
        }
        let ctx = &self.ctx;
        let draft = ctx
            .call(key, Step::Create, ctx.service.create_asset(file_fields(item, &ctx.locale)))
            .await?;
        let processed = ctx
            .call(key, Step::Process, ctx.service.process_asset(&draft, &ctx.locale))
            .await?;
        ctx.call(key, Step::Publish, ctx.service.publish(&processed))
            .await
    }
}

#[async_trait]
impl Uploader for AssetUploader {
    type Item = AssetItem;
    type Output = AssetLink;

    async fn process(&self, item: &AssetItem) -> ItemResult<AssetLink> {
        let key = item.natural_key();
        let locale = &self.ctx.locale;

        if let Some(existing) = self.entries.get(&key) {
            return Ok(Outcome::Skipped(AssetLink {
                entry_id: existing.id().to_string(),
                url: existing.fields.text("url", locale).map(str::to_string),
            }));
        }

        let file = self.resolve_file(&key, item).await?;
        let url = file_url(&file, locale).ok_or_else(|| {
            ItemError::new(
                &key,
                Step::Process,
                FailureKind::Rejected,
                "processed asset has no url",
            )
        })?;

        let fields = Fields::new()
            .with("title", locale, item.title.as_str())
            .with("altText", locale, item.description.as_str())
            .with_link("media", locale, Link::asset(file.id()))
            .with("url", locale, url.as_str());
        let entry = self
            .ctx
            .create_published(&key, &self.ctx.content_types.asset, fields)
            .await?;

        Ok(Outcome::Done(AssetLink {
            entry_id: entry.id().to_string(),
            url: Some(url),
        }))
    }
}

fn file_fields(item: &AssetItem, locale: &str) -> Fields {
    Fields::new()
        .with("title", locale, item.title.as_str())
        .with("description", locale, item.description.as_str())
        .with(
            "file",
            locale,
            json!({
                "contentType": item.mime_type(),
                "fileName": item.file_name(),
                "upload": item.link.replace(' ', "%20"),
            }),
        )
}

fn file_url(file: &Record, locale: &str) -> Option<String> {
    file.fields
        .get("file", locale)?
        .get("url")?
        .as_str()
        .map(str::to_string)
}
