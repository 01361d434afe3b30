//! Post authors.

use async_trait::async_trait;

use crate::engine::{ExistingIndex, KeyField, StageContext, Uploader};
use crate::error::Result;
use crate::model::items::AuthorItem;
use crate::model::{Fields, ItemResult, Outcome, RecordRef, WorkItem};

pub const INPUT: &str = "authors.json";

pub struct AuthorUploader {
    ctx: StageContext,
    existing: ExistingIndex,
}

impl AuthorUploader {
    pub async fn prepare(ctx: StageContext) -> Result<Self> {
        let existing = ctx
            .entry_index(&ctx.content_types.author, &KeyField::field("name"))
            .await?;
        Ok(Self { ctx, existing })
    }
}

#[async_trait]
impl Uploader for AuthorUploader {
    type Item = AuthorItem;
    type Output = RecordRef;

    async fn process(&self, item: &AuthorItem) -> ItemResult<RecordRef> {
        let key = item.natural_key();
        if let Some(existing) = self.existing.get(&key) {
            return Ok(Outcome::Skipped(existing.reference()));
        }

        let locale = &self.ctx.locale;
        let fields = Fields::new()
            .with("name", locale, item.name.as_str())
            .with("slug", locale, item.slug.as_str())
            .with("id", locale, item.slug.as_str());
        let entry = self
            .ctx
            .create_published(&key, &self.ctx.content_types.author, fields)
            .await?;
        Ok(Outcome::Done(entry.reference()))
    }
}
