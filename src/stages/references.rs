//! The per-post reference entries an article page is assembled from:
//! rich text body, publish date, main title, summary and title image.
//!
//! Each reference is found by a title derived from the post title, so a
//! re-run after a partial failure creates only the ones still missing.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use super::{Layout, Stage};
use crate::config::ContentTypes;
use crate::engine::persist::load_completed;
use crate::engine::{ExistingIndex, KeyField, StageContext, Uploader};
use crate::error::Result;
use crate::model::items::{AssetItem, AssetLink, AuthorItem, PostItem, PostReferences};
use crate::model::{Fields, ItemError, ItemResult, Link, Outcome, Record, RecordRef, WorkItem};

pub const INPUT: &str = "posts.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Content,
    PublishDate,
    MainTitle,
    Summary,
    TitleImage,
}

impl Part {
    const ALL: [Part; 5] = [
        Part::Content,
        Part::PublishDate,
        Part::MainTitle,
        Part::Summary,
        Part::TitleImage,
    ];

    fn title(self, post: &PostItem) -> String {
        let prefix = match self {
            Part::Content => "Content",
            Part::PublishDate => "Published Date",
            Part::MainTitle => "Title",
            Part::Summary => "Summary",
            Part::TitleImage => "Image",
        };
        format!("{prefix}: {}", post.title)
    }

    fn content_type(self, types: &ContentTypes) -> &str {
        match self {
            Part::Content => &types.rich_text,
            Part::PublishDate => &types.publish_date,
            Part::MainTitle => &types.main_title,
            Part::Summary => &types.summary,
            Part::TitleImage => &types.title_image,
        }
    }
}

pub struct ReferenceUploader {
    ctx: StageContext,
    /// One title index per part, in `Part::ALL` order.
    existing: Vec<ExistingIndex>,
    /// Source user ID -> author entry.
    authors: HashMap<u64, RecordRef>,
    /// Source media ID -> asset entry ID.
    heroes: HashMap<u64, String>,
    /// Source URL -> destination URL, for images inlined in post bodies.
    inline: Vec<(String, String)>,
}

impl ReferenceUploader {
    /// Build the title indexes and read the authors and assets outputs.
    pub async fn prepare(ctx: StageContext, layout: &Layout) -> Result<Self> {
        let mut existing = Vec::with_capacity(Part::ALL.len());
        for part in Part::ALL {
            let index = ctx
                .entry_index(part.content_type(&ctx.content_types), &KeyField::field("title"))
                .await?;
            existing.push(index);
        }

        let authors = load_completed::<AuthorItem, RecordRef>(&layout.stage_dir(Stage::Authors))
            .await?
            .into_iter()
            .map(|c| (c.item.id, c.record))
            .collect();

        let assets =
            load_completed::<AssetItem, AssetLink>(&layout.stage_dir(Stage::Assets)).await?;
        let mut heroes = HashMap::new();
        let mut inline = Vec::new();
        for asset in assets {
            if let Some(media) = asset.item.media_number {
                heroes.insert(media, asset.record.entry_id.clone());
            }
            if let Some(url) = asset.record.url {
                inline.push((asset.item.link, url));
            }
        }
        debug!(heroes = heroes.len(), inline = inline.len(), "asset maps loaded");

        Ok(Self {
            ctx,
            existing,
            authors,
            heroes,
            inline,
        })
    }

    fn lookup(&self, part: Part, post: &PostItem) -> Option<RecordRef> {
        self.existing[part as usize]
            .get(&part.title(post))
            .map(Record::reference)
    }

    fn author(&self, key: &str, post: &PostItem) -> std::result::Result<RecordRef, ItemError> {
        self.authors
            .get(&post.author)
            .cloned()
            .ok_or_else(|| ItemError::missing(key, &format!("author {}", post.author)))
    }

    /// `found` if the part already exists, otherwise create and publish it.
    async fn ensure(
        &self,
        key: &str,
        post: &PostItem,
        part: Part,
        found: Option<RecordRef>,
        hero: &str,
    ) -> std::result::Result<RecordRef, ItemError> {
        if let Some(reference) = found {
            return Ok(reference);
        }
        let content_type = part.content_type(&self.ctx.content_types);
        let entry = self
            .ctx
            .create_published(key, content_type, self.fields(part, post, hero))
            .await?;
        Ok(entry.reference())
    }

    fn fields(&self, part: Part, post: &PostItem, hero: &str) -> Fields {
        let locale = &self.ctx.locale;
        let fields = Fields::new().with("title", locale, part.title(post));
        match part {
            Part::Content => fields.with("text", locale, self.rewrite_inline(&post.body)),
            Part::PublishDate => {
                fields.with("articlePublishDate", locale, post.publish_date.as_str())
            }
            Part::MainTitle => fields
                .with("id", locale, post.title.as_str())
                .with("text", locale, post.title.as_str()),
            Part::Summary => fields
                .with("id", locale, post.title.as_str())
                .with("text", locale, post.title.as_str())
                .with("description", locale, post.description.as_str()),
            Part::TitleImage => fields.with_link("assets", locale, Link::entry(hero)),
        }
    }

    fn rewrite_inline(&self, body: &str) -> String {
        self.inline
            .iter()
            .fold(body.to_string(), |text, (from, to)| text.replace(from, to))
    }
}

#[async_trait]
impl Uploader for ReferenceUploader {
    type Item = PostItem;
    type Output = PostReferences;

    async fn process(&self, post: &PostItem) -> ItemResult<PostReferences> {
        let key = post.natural_key();
        let found = Part::ALL.map(|part| self.lookup(part, post));

        if let [Some(content), Some(date), Some(title), Some(summary), Some(image)] = &found {
            return Ok(Outcome::Skipped(PostReferences {
                content: content.clone(),
                publish_date: date.clone(),
                main_title: title.clone(),
                summary: summary.clone(),
                title_image: image.clone(),
                author: self.author(&key, post)?,
            }));
        }

        // Both dependencies must resolve before anything is written.
        let author = self.author(&key, post)?;
        let hero = post
            .featured_media
            .and_then(|media| self.heroes.get(&media))
            .ok_or_else(|| {
                let media = post.featured_media.unwrap_or_default();
                ItemError::missing(&key, &format!("title image (media {media})"))
            })?;

        let [content, date, title, summary, image] = found;
        Ok(Outcome::Done(PostReferences {
            content: self.ensure(&key, post, Part::Content, content, hero).await?,
            publish_date: self.ensure(&key, post, Part::PublishDate, date, hero).await?,
            main_title: self.ensure(&key, post, Part::MainTitle, title, hero).await?,
            summary: self.ensure(&key, post, Part::Summary, summary, hero).await?,
            title_image: self.ensure(&key, post, Part::TitleImage, image, hero).await?,
            author,
        }))
    }
}
