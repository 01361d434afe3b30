//! In-memory lookup of records already in the destination.
//!
//! Built once per stage by paging through every record of a type, then
//! shared read-only by all workers. This is what makes a re-run after a
//! partial failure skip work that already landed.

use std::collections::HashMap;

use opentelemetry::KeyValue;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::RateGate;
use crate::error::Result;
use crate::model::Record;
use crate::store::{MAX_PAGE_SIZE, Query, RecordService};
use crate::telemetry::metrics;

/// Which field of a record holds its natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyField {
    name: String,
    /// Property inside an object-valued field, e.g. `file.fileName`.
    nested: Option<String>,
}

impl KeyField {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nested: None,
        }
    }

    pub fn nested(name: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nested: Some(property.into()),
        }
    }

    pub fn extract(&self, record: &Record, locale: &str) -> Option<String> {
        let mut value = record.fields.get(&self.name, locale)?;
        if let Some(ref property) = self.nested {
            value = value.get(property)?;
        }
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Display for KeyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.nested {
            Some(ref property) => write!(f, "{}.{property}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Natural key -> destination record.
#[derive(Debug, Clone, Default)]
pub struct ExistingIndex {
    records: HashMap<String, Record>,
}

impl ExistingIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Page through every record matching `query` and index it by `key`.
    ///
    /// Any page failure aborts the build; no partial index is returned.
    /// Records without the key field are skipped with a warning.
    pub async fn build(
        service: &dyn RecordService,
        gate: &RateGate,
        query: Query,
        key: &KeyField,
        locale: &str,
    ) -> Result<Self> {
        let label = query.label().to_string();
        let records = fetch_all(service, gate, query).await?;
        let index = Self::from_records(records, key, locale);

        metrics::index_records().add(
            index.len() as u64,
            &[KeyValue::new("content_type", label.clone())],
        );
        info!(content_type = %label, key = %key, records = index.len(), "existing index built");
        Ok(index)
    }

    /// Index records already in hand (e.g. from a previous query).
    pub fn from_records(
        records: impl IntoIterator<Item = Record>,
        key: &KeyField,
        locale: &str,
    ) -> Self {
        let mut index = Self::empty();
        for record in records {
            index.insert(record, key, locale);
        }
        index
    }

    fn insert(&mut self, record: Record, key: &KeyField, locale: &str) {
        let Some(natural) = key.extract(&record, locale) else {
            warn!(
                record = record.id(),
                field = %key,
                "record has no natural key, not indexed"
            );
            return;
        };
        if self.records.contains_key(&natural) {
            debug!(key = %natural, record = record.id(), "duplicate natural key, keeping first");
            return;
        }
        self.records.insert(natural, record);
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Every record matching `query`, one gated page at a time.
pub async fn fetch_all(
    service: &dyn RecordService,
    gate: &RateGate,
    query: Query,
) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut skip = 0;
    let mut total = u64::MAX;

    while skip < total {
        gate.wait().await;
        let page = service
            .query(&query.clone().page(skip, MAX_PAGE_SIZE))
            .await?;
        total = page.total;
        if page.items.is_empty() {
            break;
        }
        skip += page.items.len() as u64;
        debug!(content_type = query.label(), skip, total, "fetched page");
        records.extend(page.items);
    }
    Ok(records)
}
