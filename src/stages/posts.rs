//! Article pages, assembled from each post's reference entries.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;

use super::{Layout, Stage};
use crate::engine::persist::load_completed;
use crate::engine::{ExistingIndex, KeyField, StageContext, Uploader};
use crate::error::{Error, Result};
use crate::model::items::{PostItem, PostReferences, TopicItem};
use crate::model::{Completed, Fields, ItemResult, Link, Outcome, RecordRef, WorkItem};

pub type PostWithReferences = Completed<PostItem, PostReferences>;

pub struct PostUploader {
    ctx: StageContext,
    /// Articles by site path.
    existing: ExistingIndex,
    /// Source category ID -> topic entry.
    topics: HashMap<u64, RecordRef>,
}

impl PostUploader {
    pub async fn prepare(ctx: StageContext, layout: &Layout) -> Result<Self> {
        let existing = ctx
            .entry_index(&ctx.content_types.article, &KeyField::field("slug"))
            .await?;

        // Topics are optional; articles are created without them.
        let topics = match load_completed::<TopicItem, RecordRef>(&layout.stage_dir(Stage::Topics))
            .await
        {
            Ok(done) => done.into_iter().map(|c| (c.item.id, c.record)).collect(),
            Err(Error::NotFound(path)) => {
                warn!(%path, "no topics output, articles will have no related topic");
                HashMap::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            ctx,
            existing,
            topics,
        })
    }

    fn fields(&self, post: &PostItem, refs: &PostReferences) -> Fields {
        let locale = &self.ctx.locale;
        let mut fields = Fields::new()
            .with("title", locale, post.title.as_str())
            .with("slug", locale, post.blog_path())
            .with_link("content", locale, refs.content.link())
            .with("modules", locale, vec![refs.content.link().to_value()])
            .with_link("publishDate", locale, refs.publish_date.link())
            .with_link("mainTitle", locale, refs.main_title.link())
            .with_link("summary", locale, refs.summary.link())
            .with_link("bannerImage", locale, refs.title_image.link())
            .with_link("author", locale, refs.author.link());

        let topic = post
            .categories
            .first()
            .and_then(|category| self.topics.get(category));
        if let Some(topic) = topic {
            fields = fields
                .with_link("relatedTopics", locale, topic.link())
                .with_link("relatedTopicsBottom", locale, topic.link());
        }
        if let Some(ref cta) = self.ctx.entries.cta_bottom {
            fields = fields.with_link("ctaBottom", locale, Link::entry(cta));
        }
        if let Some(ref layout) = self.ctx.entries.layout {
            fields = fields.with_link("layout", locale, Link::entry(layout));
        }
        fields
    }
}

#[async_trait]
impl Uploader for PostUploader {
    type Item = PostWithReferences;
    type Output = RecordRef;

    async fn process(&self, item: &PostWithReferences) -> ItemResult<RecordRef> {
        let key = item.natural_key();
        if let Some(existing) = self.existing.get(&item.item.blog_path()) {
            return Ok(Outcome::Skipped(existing.reference()));
        }

        let fields = self.fields(&item.item, &item.record);
        let entry = self
            .ctx
            .create_published(&key, &self.ctx.content_types.article, fields)
            .await?;
        Ok(Outcome::Done(entry.reference()))
    }
}
