//! Pacing tests for the rate gate, on tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;
use wpcf_migrate::config::Settings;
use wpcf_migrate::engine::persist::write_json;
use wpcf_migrate::engine::{RateGate, StageContext};
use wpcf_migrate::event::NullObserver;
use wpcf_migrate::model::Fields;
use wpcf_migrate::model::items::AuthorItem;
use wpcf_migrate::stages::{Layout, Migration, Stage};
use wpcf_migrate::store::MemoryStore;
use wpcf_migrate::store::memory::Op;

const LOCALE: &str = "en-US";

#[tokio::test(start_paused = true)]
async fn wait_suspends_for_the_delay() {
    let gate = RateGate::new(Duration::from_millis(750));
    let start = Instant::now();
    gate.wait().await;
    assert_eq!(start.elapsed(), Duration::from_millis(750));
}

#[tokio::test(start_paused = true)]
async fn disabled_gate_does_not_sleep() {
    let start = Instant::now();
    RateGate::disabled().wait().await;
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn every_destination_call_waits_at_the_gate() {
    let store = Arc::new(MemoryStore::new());
    let ctx = StageContext::new(store.clone(), RateGate::new(Duration::from_secs(1)), LOCALE);

    let start = Instant::now();
    let record = ctx
        .create_published("Ada", "author", Fields::new().with("name", LOCALE, "Ada"))
        .await
        .unwrap();

    // Create and publish are two calls, each behind the gate.
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert!(record.is_published());
    assert_eq!(store.calls(Op::CreateEntry), 1);
    assert_eq!(store.calls(Op::Publish), 1);
}

#[tokio::test(start_paused = true)]
async fn stage_run_is_paced_by_the_configured_delay() {
    let mut settings = Settings::default();
    settings.pipeline.api_delay_ms = 500;
    settings.pipeline.concurrency = 1;
    let dir = std::env::temp_dir().join(format!("wpcf-gate-{}", Uuid::new_v4()));
    let layout = Layout::new(&dir);

    let authors: Vec<AuthorItem> = ["Ada", "Grace", "Linus"]
        .iter()
        .enumerate()
        .map(|(n, name)| AuthorItem {
            id: n as u64 + 1,
            name: name.to_string(),
            slug: name.to_lowercase(),
        })
        .collect();
    write_json(&layout.transformed("authors.json"), &authors)
        .await
        .unwrap();

    let store = Arc::new(MemoryStore::new());
    let migration = Migration::new(store.clone(), settings, LOCALE, layout)
        .with_observer(Arc::new(NullObserver));

    let start = Instant::now();
    let summary = migration.run_stage(Stage::Authors, false).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.done, 3);
    // One index page plus create and publish for each author.
    let calls = store.calls(Op::Query) + store.calls(Op::CreateEntry) + store.calls(Op::Publish);
    assert_eq!(calls, 7);
    assert!(
        elapsed >= Duration::from_millis(500) * calls as u32,
        "{calls} gated calls finished in {elapsed:?}"
    );

    let _ = std::fs::remove_dir_all(&dir);
}
