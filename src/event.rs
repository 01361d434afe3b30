//! Structured progress events emitted by the worker pool.
//!
//! Every queue mutation (an item claimed, an item settled) produces one
//! event carrying the current counts. Observers are informational only:
//! `notify` must return promptly and never fail the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::model::Status;

/// Snapshot of queue and result sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub pending: usize,
    pub in_flight: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "remaining: {} ({} uploading, {} done, {} failed), skipped: {}",
            self.pending, self.in_flight, self.done, self.failed, self.skipped
        )
    }
}

/// A structured event emitted by the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Monotonic per run. Consumers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub kind: EventKind,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Started { total: usize, concurrency: usize },
    Claimed { key: String },
    Settled { key: String, status: Status },
    Finished,
}

pub trait ProgressObserver: Send + Sync {
    fn notify(&self, event: &ProgressEvent);
}

/// Logs settlements at info and claims at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn notify(&self, event: &ProgressEvent) {
        match event.kind {
            EventKind::Claimed { ref key } => {
                debug!(stage = %event.stage, key = %key, "{}", event.progress);
            }
            EventKind::Settled { ref key, status } => {
                info!(stage = %event.stage, key = %key, %status, "{}", event.progress);
            }
            EventKind::Started { total, concurrency } => {
                info!(stage = %event.stage, total, concurrency, "stage started");
            }
            EventKind::Finished => {
                info!(stage = %event.stage, "{}", event.progress);
            }
        }
    }
}

/// Forwards events to a channel; a dropped receiver is ignored.
impl ProgressObserver for UnboundedSender<ProgressEvent> {
    fn notify(&self, event: &ProgressEvent) {
        let _ = self.send(event.clone());
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn notify(&self, _event: &ProgressEvent) {}
}
