//! Bulk fixes over records that are already in the destination.
//!
//! Both operations page through every entry of a content type, then run
//! the records through the same worker pool and gate as the upload
//! stages. Results land under `<build>/maintenance/<operation>/<type>/`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::Migration;
use crate::engine::{StageContext, Uploader, fetch_all};
use crate::error::Result;
use crate::model::{FailureKind, ItemError, ItemResult, Link, Outcome, Record, RecordRef, Step, Summary};
use crate::store::Query;

/// Points the first link of an array field at a fixed entry.
pub struct RelinkUploader {
    ctx: StageContext,
    field: String,
    target: String,
}

impl RelinkUploader {
    pub fn new(ctx: StageContext, field: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            ctx,
            field: field.into(),
            target: target.into(),
        }
    }
}

#[async_trait]
impl Uploader for RelinkUploader {
    type Item = Record;
    type Output = RecordRef;

    async fn process(&self, record: &Record) -> ItemResult<RecordRef> {
        let key = record.id();
        let locale = &self.ctx.locale;
        let mut fields = record.fields.clone();

        let link = Link::entry(&self.target).to_value();
        match fields.get_mut(&self.field, locale) {
            Some(Value::Array(links)) => {
                let current = links
                    .first()
                    .and_then(|l| l.pointer("/sys/id"))
                    .and_then(Value::as_str);
                if current == Some(self.target.as_str()) {
                    return Ok(Outcome::Skipped(record.reference()));
                }
                match links.first_mut() {
                    Some(first) => *first = link,
                    None => links.push(link),
                }
            }
            None => fields.set(&self.field, locale, Value::Array(vec![link])),
            Some(_) => {
                return Err(ItemError::new(
                    key,
                    Step::Update,
                    FailureKind::Rejected,
                    format!("field {} is not a link list", self.field),
                ));
            }
        }

        let ctx = &self.ctx;
        let updated = ctx
            .call(key, Step::Update, ctx.service.update(record, fields))
            .await?;
        let published = ctx
            .call(key, Step::Publish, ctx.service.publish(&updated))
            .await?;
        Ok(Outcome::Done(published.reference()))
    }
}

/// Unpublishes (when needed) and deletes each record.
pub struct PurgeUploader {
    ctx: StageContext,
}

impl PurgeUploader {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Uploader for PurgeUploader {
    type Item = Record;
    type Output = RecordRef;

    async fn process(&self, record: &Record) -> ItemResult<RecordRef> {
        let key = record.id();
        let ctx = &self.ctx;
        let draft = if record.is_published() {
            ctx.call(key, Step::Unpublish, ctx.service.unpublish(record))
                .await?
        } else {
            record.clone()
        };
        ctx.call(key, Step::Delete, ctx.service.delete(&draft))
            .await?;
        Ok(Outcome::Done(record.reference()))
    }
}

impl Migration {
    /// Point `field[0]` of every `content_type` entry at `target`.
    pub async fn relink(&self, content_type: &str, field: &str, target: &str) -> Result<Summary> {
        let (ctx, pool) = self.context("relink");
        let records = fetch_all(ctx.service.as_ref(), &ctx.gate, Query::entries(content_type)).await?;
        info!(content_type, records = records.len(), field, target, "relinking");

        let dir = self.layout.maintenance_dir("relink").join(content_type);
        let uploader = RelinkUploader::new(ctx, field, target);
        self.drain("relink", &dir, uploader, records, pool, None).await
    }

    /// Delete every entry of each content type, optionally only those
    /// created by `created_by`. Types are purged in the order given.
    pub async fn purge(
        &self,
        content_types: &[String],
        created_by: Option<&str>,
    ) -> Result<Vec<(String, Summary)>> {
        let mut summaries = Vec::with_capacity(content_types.len());
        for content_type in content_types {
            let (ctx, pool) = self.context("purge");
            let mut query = Query::entries(content_type);
            if let Some(user) = created_by {
                query = query.filter("sys.createdBy.sys.id", user);
            }
            let records = fetch_all(ctx.service.as_ref(), &ctx.gate, query).await?;
            info!(content_type = %content_type, records = records.len(), "purging");

            let dir = self.layout.maintenance_dir("purge").join(content_type);
            let summary = self
                .drain("purge", &dir, PurgeUploader::new(ctx), records, pool, None)
                .await?;
            summaries.push((content_type.clone(), summary));
        }
        Ok(summaries)
    }
}
