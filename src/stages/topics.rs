//! Source categories, migrated as topic entries that each link to a
//! topic landing page.

use async_trait::async_trait;

use crate::engine::{ExistingIndex, KeyField, StageContext, Uploader};
use crate::error::Result;
use crate::model::items::TopicItem;
use crate::model::{Fields, ItemError, ItemResult, Link, Outcome, Record, RecordRef, WorkItem};

pub const INPUT: &str = "topics.json";

pub struct TopicUploader {
    ctx: StageContext,
    /// Topic entries by slug.
    existing: ExistingIndex,
    /// Landing page links by URL.
    links: ExistingIndex,
}

impl TopicUploader {
    pub async fn prepare(ctx: StageContext) -> Result<Self> {
        let existing = ctx
            .entry_index(&ctx.content_types.topic, &KeyField::field("id"))
            .await?;
        let links = ctx
            .entry_index(&ctx.content_types.link, &KeyField::field("url"))
            .await?;
        Ok(Self {
            ctx,
            existing,
            links,
        })
    }

    async fn resolve_link(&self, key: &str, item: &TopicItem) -> std::result::Result<Record, ItemError> {
        let url = item.url();
        if let Some(link) = self.links.get(&url) {
            return Ok(link.clone());
        }
        let locale = &self.ctx.locale;
        let fields = Fields::new()
            .with("title", locale, item.name.as_str())
            .with("text", locale, item.name.as_str())
            .with("id", locale, item.slug.as_str())
            .with("url", locale, url);
        self.ctx
            .create_published(key, &self.ctx.content_types.link, fields)
            .await
    }
}

#[async_trait]
impl Uploader for TopicUploader {
    type Item = TopicItem;
    type Output = RecordRef;

    async fn process(&self, item: &TopicItem) -> ItemResult<RecordRef> {
        let key = item.natural_key();
        if let Some(existing) = self.existing.get(&key) {
            return Ok(Outcome::Skipped(existing.reference()));
        }

        let link = self.resolve_link(&key, item).await?;
        let locale = &self.ctx.locale;
        let fields = Fields::new()
            .with("title", locale, item.name.as_str())
            .with("id", locale, item.slug.as_str())
            .with(
                "topicsList",
                locale,
                vec![Link::entry(link.id()).to_value()],
            );
        let entry = self
            .ctx
            .create_published(&key, &self.ctx.content_types.topic, fields)
            .await?;
        Ok(Outcome::Done(entry.reference()))
    }
}
