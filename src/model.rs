//! Core data model.
//!
//! A work item is one unit of migration (an asset, an author, a post). It
//! carries a natural key used both to find an already-migrated record in
//! the destination and to report progress. Processing an item yields an
//! [`Outcome`] or an [`ItemError`]; the worker pool files each into a
//! [`ResultSet`].

pub mod items;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// Anything the worker pool can process. Immutable once enqueued.
pub trait WorkItem: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Stable, human-meaningful key (slug, title, URL).
    fn natural_key(&self) -> String;
}

// ---------------------------------------------------------------------------
// Destination records
// ---------------------------------------------------------------------------

/// A record (entry or asset) as the destination store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub sys: Sys,
    #[serde(default)]
    pub fields: Fields,
}

impl Record {
    pub fn id(&self) -> &str {
        &self.sys.id
    }

    pub fn content_type(&self) -> Option<&str> {
        self.sys.content_type.as_ref().map(|l| l.sys.id.as_str())
    }

    pub fn is_published(&self) -> bool {
        self.sys.published_version.is_some()
    }

    pub fn reference(&self) -> RecordRef {
        RecordRef {
            id: self.sys.id.clone(),
            content_type: self.content_type().map(str::to_string),
        }
    }
}

impl WorkItem for Record {
    fn natural_key(&self) -> String {
        self.sys.id.clone()
    }
}

/// System metadata of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sys {
    pub id: String,
    /// "Entry" or "Asset".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Link>,
}

/// A typed pointer to another record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub sys: LinkSys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSys {
    #[serde(rename = "type")]
    pub kind: String,
    pub link_type: String,
    pub id: String,
}

impl Link {
    fn new(link_type: &str, id: impl Into<String>) -> Self {
        Self {
            sys: LinkSys {
                kind: "Link".to_string(),
                link_type: link_type.to_string(),
                id: id.into(),
            },
        }
    }

    pub fn entry(id: impl Into<String>) -> Self {
        Self::new("Entry", id)
    }

    pub fn asset(id: impl Into<String>) -> Self {
        Self::new("Asset", id)
    }

    pub fn content_type(id: impl Into<String>) -> Self {
        Self::new("ContentType", id)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Localized record fields: `{ field: { locale: value } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Map<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` for `locale`, keeping values for other locales.
    pub fn set(&mut self, name: &str, locale: &str, value: Value) {
        let slot = self
            .0
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(by_locale) = slot {
            by_locale.insert(locale.to_string(), value);
        }
    }

    pub fn with(mut self, name: &str, locale: &str, value: impl Into<Value>) -> Self {
        self.set(name, locale, value.into());
        self
    }

    pub fn with_link(self, name: &str, locale: &str, link: Link) -> Self {
        let value = link.to_value();
        self.with(name, locale, value)
    }

    pub fn get(&self, name: &str, locale: &str) -> Option<&Value> {
        self.0.get(name)?.get(locale)
    }

    pub fn get_mut(&mut self, name: &str, locale: &str) -> Option<&mut Value> {
        self.0.get_mut(name)?.get_mut(locale)
    }

    pub fn text(&self, name: &str, locale: &str) -> Option<&str> {
        self.get(name, locale)?.as_str()
    }

    /// ID of a single link field.
    pub fn link_id(&self, name: &str, locale: &str) -> Option<&str> {
        self.get(name, locale)?.pointer("/sys/id")?.as_str()
    }

    /// Every localized value of `name`, across locales.
    pub fn values(&self, name: &str) -> impl Iterator<Item = &Value> {
        self.0
            .get(name)
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|by_locale| by_locale.values())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Lightweight reference to a created record, persisted in stage outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl RecordRef {
    pub fn link(&self) -> Link {
        Link::entry(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Successful classification of one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "record", rename_all = "snake_case")]
pub enum Outcome<R> {
    /// Created (and published) during this run.
    Done(R),
    /// Already present in the destination; nothing written.
    Skipped(R),
}

/// What `Uploader::process` returns. Failures are values, never panics.
pub type ItemResult<R> = std::result::Result<Outcome<R>, ItemError>;

/// Terminal classification of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Done,
    Skipped,
    Failed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Done => "done",
            Status::Skipped => "skipped",
            Status::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Item errors
// ---------------------------------------------------------------------------

/// The pipeline step an item failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Resolve,
    Create,
    Process,
    Publish,
    Update,
    Unpublish,
    Delete,
    /// The item as a whole (deadline, aborted task).
    Upload,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Step::Resolve => "resolve",
            Step::Create => "create",
            Step::Process => "process",
            Step::Publish => "publish",
            Step::Update => "update",
            Step::Unpublish => "unpublish",
            Step::Delete => "delete",
            Step::Upload => "upload",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error or quota rejection; a re-run may succeed.
    Transient,
    /// The item missed its deadline. Its calls may still land.
    Timeout,
    /// A required cross-reference has not been migrated yet.
    MissingDependency,
    /// The destination refused the payload.
    Rejected,
}

/// Why one item failed, tagged with its key and the failing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{key}: {step} failed: {message}")]
pub struct ItemError {
    pub key: String,
    pub step: Step,
    pub kind: FailureKind,
    pub message: String,
}

impl ItemError {
    pub fn new(
        key: impl Into<String>,
        step: Step,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            step,
            kind,
            message: message.into(),
        }
    }

    /// Wrap a library error raised while running `step` for `key`.
    pub fn from_error(key: impl Into<String>, step: Step, err: &Error) -> Self {
        let kind = match err {
            Error::MissingDependency(_) => FailureKind::MissingDependency,
            Error::Timeout(_) => FailureKind::Timeout,
            e if e.is_transient() => FailureKind::Transient,
            _ => FailureKind::Rejected,
        };
        Self::new(key, step, kind, err.to_string())
    }

    pub fn missing(key: impl Into<String>, dependency: &str) -> Self {
        Self::new(
            key,
            Step::Resolve,
            FailureKind::MissingDependency,
            format!("missing dependency: {dependency}"),
        )
    }

    pub fn timeout(key: impl Into<String>, after: std::time::Duration) -> Self {
        Self::new(
            key,
            Step::Upload,
            FailureKind::Timeout,
            format!("gave up waiting after {after:?}"),
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, FailureKind::Transient | FailureKind::Timeout)
    }
}

// ---------------------------------------------------------------------------
// Result set
// ---------------------------------------------------------------------------

/// An item together with the destination record it produced or matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completed<T, R> {
    pub item: T,
    pub record: R,
}

impl<T: WorkItem, R> WorkItem for Completed<T, R>
where
    R: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    fn natural_key(&self) -> String {
        self.item.natural_key()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failed<T> {
    pub item: T,
    pub error: ItemError,
}

/// Three disjoint, append-only partitions of settled items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet<T, R> {
    pub done: Vec<Completed<T, R>>,
    pub skipped: Vec<Completed<T, R>>,
    pub failed: Vec<Failed<T>>,
}

impl<T, R> Default for ResultSet<T, R> {
    fn default() -> Self {
        Self {
            done: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T, R> ResultSet<T, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// File one settled item into its partition.
    pub fn record(&mut self, item: T, result: ItemResult<R>) -> Status {
        match result {
            Ok(Outcome::Done(record)) => {
                self.done.push(Completed { item, record });
                Status::Done
            }
            Ok(Outcome::Skipped(record)) => {
                self.skipped.push(Completed { item, record });
                Status::Skipped
            }
            Err(error) => {
                self.failed.push(Failed { item, error });
                Status::Failed
            }
        }
    }

    pub fn total(&self) -> usize {
        self.done.len() + self.skipped.len() + self.failed.len()
    }

    /// Done and skipped items, the inputs downstream stages consume.
    pub fn completed(&self) -> impl Iterator<Item = &Completed<T, R>> {
        self.done.iter().chain(self.skipped.iter())
    }

    pub fn summary(&self) -> Summary {
        Summary {
            done: self.done.len(),
            skipped: self.skipped.len(),
            failed: self.failed.len(),
        }
    }
}

/// Partition sizes of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} done, {} skipped, {} failed",
            self.done, self.skipped, self.failed
        )
    }
}
