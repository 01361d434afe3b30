//! In-process record store with the destination's paging and filter semantics.
//!
//! Backs `--dry-run` and the test suite. Counts every call per operation
//! and can inject faults: an operation whose serialized payload contains a
//! needle either fails with a status code or never settles.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Page, Query, RecordKind, RecordService};
use crate::error::{Error, Result};
use crate::model::{Fields, Link, Record, Sys};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Query,
    CreateEntry,
    Update,
    Publish,
    Unpublish,
    Delete,
    CreateAsset,
    ProcessAsset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Reject with this HTTP status.
    Fail(u16),
    /// Never settle.
    Hang,
}

#[derive(Debug, Clone)]
struct Fault {
    op: Op,
    needle: String,
    effect: Effect,
}

#[derive(Default)]
struct Inner {
    records: Vec<Record>,
    next_id: u64,
    calls: HashMap<Op, usize>,
    faults: Vec<Fault>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    latency: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, to make overlap observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail `op` with `status` whenever its payload contains `needle`.
    pub fn fail_when(&self, op: Op, needle: impl Into<String>, status: u16) {
        self.add_fault(op, needle.into(), Effect::Fail(status));
    }

    /// Make `op` hang forever whenever its payload contains `needle`.
    pub fn hang_when(&self, op: Op, needle: impl Into<String>) {
        self.add_fault(op, needle.into(), Effect::Hang);
    }

    fn add_fault(&self, op: Op, needle: String, effect: Effect) {
        self.lock().faults.push(Fault { op, needle, effect });
    }

    /// Insert a published entry directly, bypassing call counting.
    pub fn seed_entry(&self, content_type: &str, fields: Fields) -> Record {
        let mut inner = self.lock();
        let mut record = new_record(&mut inner, RecordKind::Entry, Some(content_type), fields);
        record.sys.published_version = Some(record.sys.version);
        inner.records.push(record.clone());
        record
    }

    /// Insert a published asset directly, bypassing call counting.
    pub fn seed_asset(&self, fields: Fields) -> Record {
        let mut inner = self.lock();
        let mut record = new_record(&mut inner, RecordKind::Asset, None, fields);
        record.sys.published_version = Some(record.sys.version);
        inner.records.push(record.clone());
        record
    }

    /// Number of calls made to `op` so far.
    pub fn calls(&self, op: Op) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Snapshot of all entries of `content_type`, in creation order.
    pub fn entries_of(&self, content_type: &str) -> Vec<Record> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.content_type() == Some(content_type))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        self.lock().records.iter().find(|r| r.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panicked test thread must not wedge every other caller.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the call, apply latency, then any matching fault.
    async fn enter(&self, op: Op, payload: &str) -> Result<()> {
        let effect = {
            let mut inner = self.lock();
            *inner.calls.entry(op).or_insert(0) += 1;
            inner
                .faults
                .iter()
                .find(|f| f.op == op && payload.contains(&f.needle))
                .map(|f| f.effect)
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match effect {
            None => Ok(()),
            Some(Effect::Fail(status)) => Err(Error::Destination {
                status,
                message: format!("injected {op:?} failure"),
            }),
            Some(Effect::Hang) => std::future::pending().await,
        }
    }

    /// Apply `f` to the stored record with `id` and return the result.
    fn modify(&self, id: &str, f: impl FnOnce(&mut Record) -> Result<()>) -> Result<Record> {
        let mut inner = self.lock();
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| not_found(id))?;
        f(record)?;
        record.sys.version += 1;
        Ok(record.clone())
    }
}

fn new_record(
    inner: &mut Inner,
    kind: RecordKind,
    content_type: Option<&str>,
    fields: Fields,
) -> Record {
    inner.next_id += 1;
    Record {
        sys: Sys {
            id: format!("mem-{}", inner.next_id),
            kind: kind.as_str().to_string(),
            version: 1,
            published_version: None,
            content_type: content_type.map(Link::content_type),
            created_by: None,
        },
        fields,
    }
}

fn not_found(id: &str) -> Error {
    Error::Destination {
        status: 404,
        message: format!("record {id} not found"),
    }
}

fn payload_of(record: &Record) -> String {
    serde_json::to_string(record).unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Apply one search parameter. Unknown parameters match everything.
fn matches(record: &Record, key: &str, expected: &str) -> bool {
    if let Some(rest) = key.strip_prefix("fields.") {
        let (name, substring) = match rest.strip_suffix("[match]") {
            Some(name) => (name, true),
            None => (rest, false),
        };
        return record.fields.values(name).map(value_text).any(|actual| {
            if substring {
                actual.contains(expected)
            } else {
                actual == expected
            }
        });
    }
    match key {
        "sys.id" => record.id() == expected,
        "sys.createdBy.sys.id" => record
            .sys
            .created_by
            .as_ref()
            .is_some_and(|l| l.sys.id == expected),
        _ => true,
    }
}

#[async_trait]
impl RecordService for MemoryStore {
    async fn query(&self, query: &Query) -> Result<Page> {
        self.enter(Op::Query, query.label()).await?;
        let inner = self.lock();
        let matched: Vec<&Record> = inner
            .records
            .iter()
            .filter(|r| r.sys.kind == query.kind.as_str())
            .filter(|r| match query.content_type {
                Some(ref ct) => r.content_type() == Some(ct.as_str()),
                None => true,
            })
            .filter(|r| query.filters.iter().all(|(k, v)| matches(r, k, v)))
            .collect();
        Ok(Page {
            total: matched.len() as u64,
            skip: query.skip,
            limit: query.limit,
            items: matched
                .into_iter()
                .skip(query.skip as usize)
                .take(query.limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn create_entry(&self, content_type: &str, fields: Fields) -> Result<Record> {
        let payload = serde_json::to_string(&fields)?;
        self.enter(Op::CreateEntry, &payload).await?;
        let mut inner = self.lock();
        let record = new_record(&mut inner, RecordKind::Entry, Some(content_type), fields);
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, record: &Record, fields: Fields) -> Result<Record> {
        self.enter(Op::Update, &payload_of(record)).await?;
        let version = record.sys.version;
        self.modify(record.id(), |stored| {
            if stored.sys.version != version {
                return Err(Error::Destination {
                    status: 409,
                    message: format!("version mismatch for {}", stored.id()),
                });
            }
            stored.fields = fields;
            Ok(())
        })
    }

    async fn publish(&self, record: &Record) -> Result<Record> {
        self.enter(Op::Publish, &payload_of(record)).await?;
        self.modify(record.id(), |stored| {
            stored.sys.published_version = Some(stored.sys.version);
            Ok(())
        })
    }

    async fn unpublish(&self, record: &Record) -> Result<Record> {
        self.enter(Op::Unpublish, &payload_of(record)).await?;
        self.modify(record.id(), |stored| {
            stored.sys.published_version = None;
            Ok(())
        })
    }

    async fn delete(&self, record: &Record) -> Result<()> {
        self.enter(Op::Delete, &payload_of(record)).await?;
        let mut inner = self.lock();
        let pos = inner
            .records
            .iter()
            .position(|r| r.id() == record.id())
            .ok_or_else(|| not_found(record.id()))?;
        if inner.records[pos].is_published() {
            return Err(Error::Destination {
                status: 400,
                message: format!("cannot delete published record {}", record.id()),
            });
        }
        inner.records.remove(pos);
        Ok(())
    }

    async fn create_asset(&self, fields: Fields) -> Result<Record> {
        let payload = serde_json::to_string(&fields)?;
        self.enter(Op::CreateAsset, &payload).await?;
        let mut inner = self.lock();
        let record = new_record(&mut inner, RecordKind::Asset, None, fields);
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn process_asset(&self, asset: &Record, locale: &str) -> Result<Record> {
        self.enter(Op::ProcessAsset, &payload_of(asset)).await?;
        let id = asset.id().to_string();
        self.modify(&id, |stored| {
            let file = stored
                .fields
                .get_mut("file", locale)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| Error::Destination {
                    status: 422,
                    message: format!("asset {id} has no file for {locale}"),
                })?;
            let name = file
                .get("fileName")
                .and_then(Value::as_str)
                .unwrap_or("file")
                .to_string();
            file.remove("upload");
            file.insert(
                "url".to_string(),
                Value::String(format!("//assets.memory/{id}/{name}")),
            );
            Ok(())
        })
    }
}
