//! Integration tests for the bounded worker pool.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use wpcf_migrate::engine::{PoolConfig, Uploader, WorkerPool};
use wpcf_migrate::event::{EventKind, ProgressEvent};
use wpcf_migrate::model::{
    FailureKind, ItemError, ItemResult, Outcome, Status, Step, WorkItem,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Job {
    key: String,
}

impl WorkItem for Job {
    fn natural_key(&self) -> String {
        self.key.clone()
    }
}

fn jobs(keys: &[&str]) -> Vec<Job> {
    keys.iter()
        .map(|k| Job { key: k.to_string() })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Skip,
    Fail,
    Hang,
    Panic,
}

/// Test uploader: sleeps, tracks overlap, then acts per key.
#[derive(Default)]
struct Recorder {
    delay: Duration,
    behaviour: HashMap<String, Behaviour>,
    active: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<String>>,
}

impl Recorder {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn with(mut self, key: &str, behaviour: Behaviour) -> Self {
        self.behaviour.insert(key.to_string(), behaviour);
        self
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Uploader for Recorder {
    type Item = Job;
    type Output = String;

    async fn process(&self, item: &Job) -> ItemResult<String> {
        self.started.lock().unwrap().push(item.key.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let behaviour = self.behaviour.get(&item.key).copied();
        if let Some(Behaviour::Hang) = behaviour {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        match behaviour {
            Some(Behaviour::Skip) => Ok(Outcome::Skipped(format!("existing-{}", item.key))),
            Some(Behaviour::Fail) => Err(ItemError::new(
                &item.key,
                Step::Create,
                FailureKind::Rejected,
                "422 validation failed",
            )),
            Some(Behaviour::Panic) => panic!("uploader bug on {}", item.key),
            _ => Ok(Outcome::Done(format!("created-{}", item.key))),
        }
    }
}

fn config(concurrency: usize, timeout_secs: u64) -> PoolConfig {
    PoolConfig {
        concurrency,
        upload_timeout: Duration::from_secs(timeout_secs),
    }
}

fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn claimed(events: &[ProgressEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Claimed { ref key } => Some(key.clone()),
            _ => None,
        })
        .collect()
}

fn settled(events: &[ProgressEvent]) -> Vec<(String, Status)> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Settled { ref key, status } => Some((key.clone(), status)),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Concurrency bound and ordering
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn ten_items_never_exceed_three_in_flight() {
    let keys = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
    let recorder = Arc::new(Recorder::new(Duration::from_millis(100)));
    let (tx, mut rx) = unbounded_channel();

    let results = WorkerPool::new("test", jobs(&keys), config(3, 60))
        .with_observer(Arc::new(tx))
        .run(Arc::clone(&recorder))
        .await;

    assert_eq!(results.done.len(), 10);
    assert_eq!(recorder.peak(), 3);

    let events = drain(&mut rx);
    assert_eq!(claimed(&events), keys.to_vec());
    for event in &events {
        assert!(event.progress.in_flight <= 3, "{:?}", event.progress);
    }
}

#[tokio::test(start_paused = true)]
async fn zero_concurrency_is_treated_as_one() {
    let recorder = Arc::new(Recorder::new(Duration::from_millis(10)));
    let results = WorkerPool::new("test", jobs(&["a", "b", "c"]), config(0, 60))
        .run(Arc::clone(&recorder))
        .await;

    assert_eq!(results.done.len(), 3);
    assert_eq!(recorder.peak(), 1);
}

#[tokio::test(start_paused = true)]
async fn fewer_items_than_slots() {
    let recorder = Arc::new(Recorder::new(Duration::from_millis(10)));
    let results = WorkerPool::new("test", jobs(&["a", "b"]), config(8, 60))
        .run(Arc::clone(&recorder))
        .await;

    assert_eq!(results.done.len(), 2);
    assert_eq!(recorder.peak(), 2);
}

#[tokio::test]
async fn empty_queue_completes_immediately() {
    let (tx, mut rx) = unbounded_channel();
    let results = WorkerPool::new("test", Vec::new(), config(4, 60))
        .with_observer(Arc::new(tx))
        .run(Arc::new(Recorder::default()))
        .await;

    assert_eq!(results.total(), 0);
    let kinds: Vec<EventKind> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Started {
                total: 0,
                concurrency: 4
            },
            EventKind::Finished
        ]
    );
}

// ---------------------------------------------------------------------------
// Classification and completeness
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn every_item_lands_in_exactly_one_partition() {
    let keys = ["a", "b", "c", "d", "e", "f", "g"];
    let recorder = Recorder::new(Duration::from_millis(50))
        .with("b", Behaviour::Skip)
        .with("e", Behaviour::Skip)
        .with("c", Behaviour::Fail)
        .with("g", Behaviour::Fail);

    let results = WorkerPool::new("test", jobs(&keys), config(3, 60))
        .run(Arc::new(recorder))
        .await;

    assert_eq!(results.done.len(), 3);
    assert_eq!(results.skipped.len(), 2);
    assert_eq!(results.failed.len(), 2);

    let mut seen = HashSet::new();
    for key in results
        .done
        .iter()
        .chain(results.skipped.iter())
        .map(|c| c.item.key.clone())
        .chain(results.failed.iter().map(|f| f.item.key.clone()))
    {
        assert!(seen.insert(key.clone()), "{key} classified twice");
    }
    assert_eq!(seen.len(), keys.len());

    let skipped = results.skipped.iter().find(|c| c.item.key == "b").unwrap();
    assert_eq!(skipped.record, "existing-b");
    let failed = results.failed.iter().find(|f| f.item.key == "c").unwrap();
    assert_eq!(failed.error.step, Step::Create);
    assert_eq!(failed.error.kind, FailureKind::Rejected);
}

#[tokio::test(start_paused = true)]
async fn duplicate_keys_are_both_processed() {
    let recorder = Arc::new(Recorder::new(Duration::from_millis(10)));
    let results = WorkerPool::new("test", jobs(&["same", "same"]), config(2, 60))
        .run(Arc::clone(&recorder))
        .await;

    assert_eq!(results.done.len(), 2);
    assert_eq!(recorder.started.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn panicking_uploader_is_filed_as_failed() {
    let recorder = Recorder::new(Duration::ZERO).with("boom", Behaviour::Panic);
    let results = WorkerPool::new("test", jobs(&["ok", "boom"]), config(2, 60))
        .run(Arc::new(recorder))
        .await;

    assert_eq!(results.done.len(), 1);
    assert_eq!(results.failed.len(), 1);
    let failed = &results.failed[0];
    assert_eq!(failed.item.key, "boom");
    assert_eq!(failed.error.step, Step::Upload);
    assert!(failed.error.message.contains("aborted"));
}

// ---------------------------------------------------------------------------
// Timeout isolation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn hung_item_times_out_without_blocking_others() {
    let recorder = Recorder::new(Duration::from_secs(1)).with("stuck", Behaviour::Hang);
    let (tx, mut rx) = unbounded_channel();
    let started = tokio::time::Instant::now();

    let results = WorkerPool::new("test", jobs(&["stuck", "a", "b", "c"]), config(2, 60))
        .with_observer(Arc::new(tx))
        .run(Arc::new(recorder))
        .await;

    assert_eq!(results.done.len(), 3);
    assert_eq!(results.failed.len(), 1);
    let failed = &results.failed[0];
    assert_eq!(failed.item.key, "stuck");
    assert_eq!(failed.error.kind, FailureKind::Timeout);
    assert!(failed.error.is_retryable());

    // The run ends at the deadline, not later.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(61), "{elapsed:?}");

    // The other three finished through the free slot while it hung.
    let order: Vec<String> = settled(&drain(&mut rx)).into_iter().map(|(k, _)| k).collect();
    assert_eq!(order, vec!["a", "b", "c", "stuck"]);
}

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn progress_events_are_sequenced_and_balanced() {
    let recorder = Recorder::new(Duration::from_millis(20)).with("c", Behaviour::Fail);
    let (tx, mut rx) = unbounded_channel();

    WorkerPool::new("authors", jobs(&["a", "b", "c", "d"]), config(2, 60))
        .with_observer(Arc::new(tx))
        .run(Arc::new(recorder))
        .await;

    let events = drain(&mut rx);
    // Started, 4 claims, 4 settlements, Finished.
    assert_eq!(events.len(), 10);
    for pair in events.windows(2) {
        assert!(pair[1].seq > pair[0].seq);
    }
    assert!(events.iter().all(|e| e.stage == "authors"));

    let last = events.last().unwrap();
    assert_eq!(last.kind, EventKind::Finished);
    assert_eq!(last.progress.pending, 0);
    assert_eq!(last.progress.in_flight, 0);
    assert_eq!(last.progress.done, 3);
    assert_eq!(last.progress.failed, 1);

    let statuses: HashMap<String, Status> = settled(&events).into_iter().collect();
    assert_eq!(statuses["c"], Status::Failed);
    assert_eq!(statuses["a"], Status::Done);
}
