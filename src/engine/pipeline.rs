//! Per-item upload pipeline: the [`Uploader`] seam and the shared context
//! every stage runs its destination calls through.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::KeyValue;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{ExistingIndex, KeyField, RateGate};
use crate::config::{ContentTypes, FixedEntries};
use crate::error::Result;
use crate::model::{Fields, ItemError, ItemResult, Record, Step, WorkItem};
use crate::store::{Query, RecordService};
use crate::telemetry::metrics;

/// Processes one work item: existence check, dependency resolution,
/// create, publish.
///
/// Implementations return every failure as an [`ItemError`]. A panic is
/// caught by the pool and classified as failed, but should not happen.
#[async_trait]
pub trait Uploader: Send + Sync + 'static {
    type Item: WorkItem;
    type Output: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    async fn process(&self, item: &Self::Item) -> ItemResult<Self::Output>;
}

/// Destination handle plus pacing and schema, shared by every worker.
#[derive(Clone)]
pub struct StageContext {
    pub service: Arc<dyn RecordService>,
    pub gate: RateGate,
    pub locale: String,
    pub content_types: ContentTypes,
    pub entries: FixedEntries,
}

impl StageContext {
    pub fn new(service: Arc<dyn RecordService>, gate: RateGate, locale: impl Into<String>) -> Self {
        Self {
            service,
            gate,
            locale: locale.into(),
            content_types: ContentTypes::default(),
            entries: FixedEntries::default(),
        }
    }

    pub fn with_schema(mut self, content_types: ContentTypes, entries: FixedEntries) -> Self {
        self.content_types = content_types;
        self.entries = entries;
        self
    }

    /// Index every entry of `content_type` by `key`. Fatal on failure.
    pub async fn entry_index(&self, content_type: &str, key: &KeyField) -> Result<ExistingIndex> {
        ExistingIndex::build(
            self.service.as_ref(),
            &self.gate,
            Query::entries(content_type),
            key,
            &self.locale,
        )
        .await
    }

    pub async fn asset_index(&self, key: &KeyField) -> Result<ExistingIndex> {
        ExistingIndex::build(
            self.service.as_ref(),
            &self.gate,
            Query::assets(),
            key,
            &self.locale,
        )
        .await
    }

    /// Run one destination call for `key`: wait at the gate, then await
    /// `op`, tagging any error with the key and step.
    pub async fn call<R, F>(&self, key: &str, step: Step, op: F) -> std::result::Result<R, ItemError>
    where
        F: Future<Output = Result<R>> + Send,
    {
        self.gate.wait().await;
        metrics::destination_calls().add(1, &[KeyValue::new("operation", step.to_string())]);
        op.await.map_err(|e| ItemError::from_error(key, step, &e))
    }

    /// Create an entry and publish it. A publish failure leaves the draft
    /// in place; the next run finds it through the index.
    pub async fn create_published(
        &self,
        key: &str,
        content_type: &str,
        fields: Fields,
    ) -> std::result::Result<Record, ItemError> {
        let draft = self
            .call(
                key,
                Step::Create,
                self.service.create_entry(content_type, fields),
            )
            .await?;
        self.call(key, Step::Publish, self.service.publish(&draft))
            .await
    }
}
