//! Work items for each upload stage, and the records they hand downstream.

use serde::{Deserialize, Serialize};

use super::{RecordRef, WorkItem};

/// A media file referenced by posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetItem {
    /// Source URL of the binary.
    pub link: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Source media ID, set when a post uses this as its featured image.
    #[serde(default)]
    pub media_number: Option<u64>,
}

impl AssetItem {
    /// Last path segment of the source URL.
    pub fn file_name(&self) -> &str {
        self.link.rsplit('/').next().unwrap_or(&self.link)
    }

    pub fn mime_type(&self) -> &'static str {
        let ext = self
            .file_name()
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            _ => "image/jpeg",
        }
    }
}

impl WorkItem for AssetItem {
    fn natural_key(&self) -> String {
        self.title.clone()
    }
}

/// Where a migrated asset ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLink {
    /// The wrapping `asset` entry, which posts link to.
    pub entry_id: String,
    /// Public URL of the processed binary.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorItem {
    /// Source user ID.
    pub id: u64,
    pub name: String,
    pub slug: String,
}

impl WorkItem for AuthorItem {
    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

/// A source category, migrated as a topic entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicItem {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

impl TopicItem {
    pub fn url(&self) -> String {
        format!("/blog/topic/{}", self.slug)
    }
}

impl WorkItem for TopicItem {
    fn natural_key(&self) -> String {
        self.slug.clone()
    }
}

/// A post in transformed (destination-ready) shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostItem {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub publish_date: String,
    /// Source user ID of the author.
    pub author: u64,
    #[serde(default)]
    pub featured_media: Option<u64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: Vec<u64>,
}

impl PostItem {
    /// Site path of the article, always under `/blog/`.
    pub fn blog_path(&self) -> String {
        if self.slug.contains("/blog/") {
            self.slug.clone()
        } else {
            format!("/blog/{}", self.slug)
        }
    }
}

impl WorkItem for PostItem {
    fn natural_key(&self) -> String {
        self.slug.clone()
    }
}

/// The entries an article page links to, created one per post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostReferences {
    pub content: RecordRef,
    pub publish_date: RecordRef,
    pub main_title: RecordRef,
    pub summary: RecordRef,
    pub title_image: RecordRef,
    pub author: RecordRef,
}
