//! Bounded worker pool draining a pending queue through an [`Uploader`].
//!
//! The pool owns the pending queue, the in-flight set and the result
//! partitions. All three are mutated only from the `run` loop, one
//! settlement at a time, so no locking is needed. Each item's pipeline
//! runs as its own tokio task raced against a deadline; a timed-out task
//! is detached rather than aborted, so its destination calls may still
//! land after the item is filed as failed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use opentelemetry::KeyValue;
use tracing::{Instrument, error, warn};

use super::Uploader;
use crate::config::PoolSettings;
use crate::event::{EventKind, LogObserver, Progress, ProgressEvent, ProgressObserver};
use crate::model::{FailureKind, ItemError, ItemResult, ResultSet, Step, WorkItem};
use crate::telemetry::{metrics, work};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum items in flight. Zero is treated as one.
    pub concurrency: usize,
    /// Per-item deadline.
    pub upload_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            upload_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&PoolSettings> for PoolConfig {
    fn from(settings: &PoolSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            upload_timeout: settings.upload_timeout(),
        }
    }
}

/// What a finished slot hands back to the run loop.
type Settlement<T, R> = (u64, T, ItemResult<R>);

pub struct WorkerPool<T: WorkItem> {
    stage: String,
    config: PoolConfig,
    /// Claimed front first, in submission order.
    pending: VecDeque<T>,
    /// Ticket -> natural key of every item currently being processed.
    in_flight: HashMap<u64, String>,
    next_ticket: u64,
    observer: Arc<dyn ProgressObserver>,
    seq: u64,
}

impl<T: WorkItem> WorkerPool<T> {
    pub fn new(stage: impl Into<String>, items: Vec<T>, config: PoolConfig) -> Self {
        Self {
            stage: stage.into(),
            config,
            pending: items.into(),
            in_flight: HashMap::new(),
            next_ticket: 0,
            observer: Arc::new(LogObserver),
            seq: 0,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Process every pending item and return the partitions.
    ///
    /// Completes exactly when the queue is empty and nothing is in
    /// flight; every submitted item lands in exactly one partition.
    pub async fn run<U>(mut self, uploader: Arc<U>) -> ResultSet<T, U::Output>
    where
        U: Uploader<Item = T>,
    {
        let limit = self.config.concurrency.max(1);
        let mut results = ResultSet::new();
        let mut slots = FuturesUnordered::new();

        self.emit(
            EventKind::Started {
                total: self.pending.len(),
                concurrency: limit,
            },
            &results,
        );

        while slots.len() < limit {
            let Some(item) = self.pending.pop_front() else {
                break;
            };
            slots.push(self.claim(item, &uploader, &results));
        }

        while let Some((ticket, item, result)) = slots.next().await {
            self.in_flight.remove(&ticket);
            let key = item.natural_key();
            let status = results.record(item, result);
            metrics::items_settled().add(
                1,
                &[
                    KeyValue::new("stage", self.stage.clone()),
                    KeyValue::new("status", status.to_string()),
                ],
            );
            self.emit(EventKind::Settled { key, status }, &results);

            // The freed slot takes the next item, or exits if none remain.
            if let Some(next) = self.pending.pop_front() {
                slots.push(self.claim(next, &uploader, &results));
            }
        }

        if !self.in_flight.is_empty() {
            error!(stage = %self.stage, leaked = self.in_flight.len(), "in-flight set not drained");
        }
        self.emit(EventKind::Finished, &results);
        results
    }

    fn claim<U>(
        &mut self,
        item: T,
        uploader: &Arc<U>,
        results: &ResultSet<T, U::Output>,
    ) -> std::pin::Pin<Box<dyn Future<Output = Settlement<T, U::Output>> + Send>>
    where
        U: Uploader<Item = T>,
    {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let key = item.natural_key();
        self.in_flight.insert(ticket, key.clone());
        self.emit(EventKind::Claimed { key }, results);

        Box::pin(run_slot(
            ticket,
            item,
            Arc::clone(uploader),
            self.config.upload_timeout,
            self.stage.clone(),
        ))
    }

    fn emit<R>(&mut self, kind: EventKind, results: &ResultSet<T, R>) {
        self.seq += 1;
        let summary = results.summary();
        let event = ProgressEvent {
            seq: self.seq,
            timestamp: Utc::now(),
            stage: self.stage.clone(),
            kind,
            progress: Progress {
                pending: self.pending.len(),
                in_flight: self.in_flight.len(),
                done: summary.done,
                skipped: summary.skipped,
                failed: summary.failed,
            },
        };
        self.observer.notify(&event);
    }
}

/// Run one item's pipeline on its own task and wait at most `deadline`.
async fn run_slot<U: Uploader>(
    ticket: u64,
    item: U::Item,
    uploader: Arc<U>,
    deadline: Duration,
    stage: String,
) -> Settlement<U::Item, U::Output> {
    let key = item.natural_key();
    let span = work::start_item_span(&stage, &key);
    let started = Instant::now();

    let task = {
        let item = item.clone();
        tokio::spawn(async move { uploader.process(&item).await }.instrument(span.clone()))
    };

    let result = match tokio::time::timeout(deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ItemError::new(
            &key,
            Step::Upload,
            FailureKind::Rejected,
            format!("upload task aborted: {join_err}"),
        )),
        Err(_) => {
            warn!(stage = %stage, key = %key, ?deadline, "item timed out, leaving its calls running");
            Err(ItemError::timeout(&key, deadline))
        }
    };

    metrics::item_duration_ms().record(
        started.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("stage", stage)],
    );
    work::record_settlement(&span, &result);
    (ticket, item, result)
}
