//! Converts downloaded source pages into the upload stages' inputs.
//!
//! Pure functions over the raw shapes, plus [`run`] which reads every
//! page from disk and writes `authors.json`, `topics.json`, `posts.json`
//! and `assets.json` under `<build>/transformed/`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::engine::persist::{read_json, write_json};
use crate::error::Result;
use crate::model::items::{AssetItem, AuthorItem, PostItem, TopicItem};
use crate::source::wordpress::{WpCategory, WpMedia, WpPost, WpUser};
use crate::stages::{Layout, authors, assets, references, topics};

/// Item counts written by one transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSummary {
    pub authors: usize,
    pub topics: usize,
    pub posts: usize,
    pub assets: usize,
}

impl std::fmt::Display for TransformSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} authors, {} topics, {} posts, {} assets",
            self.authors, self.topics, self.posts, self.assets
        )
    }
}

/// Transform everything under `<build>/wordpress/`.
pub async fn run(layout: &Layout) -> Result<TransformSummary> {
    let users: Vec<WpUser> = read_pages(&layout.source_dir("users")).await?;
    let categories: Vec<WpCategory> = read_pages(&layout.source_dir("categories")).await?;
    let posts: Vec<WpPost> = read_pages(&layout.source_dir("posts")).await?;
    let media: Vec<WpMedia> = read_pages(&layout.source_dir("media")).await?;

    let authors: Vec<AuthorItem> = users.iter().map(author_item).collect();
    let topics: Vec<TopicItem> = categories.iter().map(topic_item).collect();
    let post_items: Vec<PostItem> = posts.iter().map(post_item).collect();
    let asset_items = asset_items(&posts, &media);

    write_json(&layout.transformed(authors::INPUT), &authors).await?;
    write_json(&layout.transformed(topics::INPUT), &topics).await?;
    write_json(&layout.transformed(references::INPUT), &post_items).await?;
    write_json(&layout.transformed(assets::INPUT), &asset_items).await?;

    let summary = TransformSummary {
        authors: authors.len(),
        topics: topics.len(),
        posts: post_items.len(),
        assets: asset_items.len(),
    };
    info!(%summary, "transform written");
    Ok(summary)
}

/// Concatenate every page file in `dir`, in file name order.
pub async fn read_pages<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    let mut items = Vec::new();
    for file in files {
        let page: Vec<T> = read_json(&file).await?;
        items.extend(page);
    }
    Ok(items)
}

pub fn author_item(user: &WpUser) -> AuthorItem {
    AuthorItem {
        id: user.id,
        name: decode_entities(&user.name),
        slug: user.slug.clone(),
    }
}

pub fn topic_item(category: &WpCategory) -> TopicItem {
    TopicItem {
        id: category.id,
        name: decode_entities(&category.name),
        slug: category.slug.clone(),
    }
}

pub fn post_item(post: &WpPost) -> PostItem {
    let description = post
        .yoast_head_json
        .as_ref()
        .and_then(|y| y.description.clone())
        .or_else(|| post.excerpt.as_ref().map(|e| strip_tags(&e.rendered)))
        .unwrap_or_default();
    PostItem {
        id: post.id,
        slug: post.slug.clone(),
        title: decode_entities(&post.title.rendered),
        body: post.content.rendered.clone(),
        publish_date: post.date.clone(),
        author: post.author,
        featured_media: (post.featured_media != 0).then_some(post.featured_media),
        description: decode_entities(description.trim()),
        categories: post.categories.clone(),
    }
}

/// Media that some post uses, either as its featured image or inline in
/// its body. Titles come out unique; a repeated title is suffixed with
/// the media id.
pub fn asset_items(posts: &[WpPost], media: &[WpMedia]) -> Vec<AssetItem> {
    let featured: HashSet<u64> = posts.iter().map(|p| p.featured_media).collect();
    let mut titles = HashSet::new();
    let mut items = Vec::new();

    for m in media {
        let is_featured = featured.contains(&m.id);
        let is_inline = posts
            .iter()
            .any(|p| p.content.rendered.contains(&m.source_url));
        if !is_featured && !is_inline {
            continue;
        }

        let mut title = decode_entities(m.title.rendered.trim());
        if title.is_empty() {
            title = m
                .source_url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
        }
        // Asset entries are keyed by title, so a repeat gets its media id.
        if !titles.insert(title.clone()) {
            let renamed = format!("{title} ({})", m.id);
            warn!(media = m.id, %title, %renamed, "duplicate asset title");
            titles.insert(renamed.clone());
            title = renamed;
        }

        items.push(AssetItem {
            link: m.source_url.clone(),
            title,
            description: m.alt_text.clone(),
            media_number: is_featured.then_some(m.id),
        });
    }
    items
}

/// Decode the handful of HTML entities the source emits in titles.
pub fn decode_entities(text: &str) -> String {
    const ENTITIES: [(&str, &str); 11] = [
        ("&#8217;", "\u{2019}"),
        ("&#8216;", "\u{2018}"),
        ("&#8220;", "\u{201C}"),
        ("&#8221;", "\u{201D}"),
        ("&#8211;", "\u{2013}"),
        ("&#8212;", "\u{2014}"),
        ("&#038;", "&"),
        ("&nbsp;", " "),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&amp;", "&"),
    ];
    ENTITIES
        .into_iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
