//! Integration tests for stage result persistence.

use std::path::PathBuf;

use uuid::Uuid;
use wpcf_migrate::engine::persist::{
    DONE_FILE, FAILED_FILE, SKIPPED_FILE, load_completed, load_failed, load_results,
    persist_results,
};
use wpcf_migrate::error::Error;
use wpcf_migrate::model::items::AuthorItem;
use wpcf_migrate::model::{FailureKind, ItemError, Outcome, RecordRef, ResultSet, Step};

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("wpcf-persist-{}", Uuid::new_v4()))
}

fn author(id: u64, name: &str) -> AuthorItem {
    AuthorItem {
        id,
        name: name.to_string(),
        slug: name.to_lowercase(),
    }
}

fn entry(id: &str) -> RecordRef {
    RecordRef {
        id: id.to_string(),
        content_type: Some("author".to_string()),
    }
}

fn sample() -> ResultSet<AuthorItem, RecordRef> {
    let mut results = ResultSet::new();
    results.record(author(1, "Ada"), Ok(Outcome::Done(entry("e1"))));
    results.record(author(2, "Grace"), Ok(Outcome::Skipped(entry("e2"))));
    results.record(
        author(3, "Linus"),
        Err(ItemError::new(
            "Linus",
            Step::Create,
            FailureKind::Transient,
            "429 rate limited",
        )),
    );
    results
}

#[tokio::test]
async fn persist_writes_three_files_and_reads_back() {
    let dir = temp_dir();
    let results = sample();

    persist_results(&dir, &results).await.unwrap();

    for file in [DONE_FILE, SKIPPED_FILE, FAILED_FILE] {
        assert!(dir.join(file).exists(), "{file} missing");
    }
    // No temp files left behind.
    let leftovers = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);

    let loaded: ResultSet<AuthorItem, RecordRef> = load_results(&dir).await.unwrap();
    assert_eq!(loaded, results);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn load_completed_joins_done_and_skipped() {
    let dir = temp_dir();
    persist_results(&dir, &sample()).await.unwrap();

    let completed = load_completed::<AuthorItem, RecordRef>(&dir).await.unwrap();
    let names: Vec<&str> = completed.iter().map(|c| c.item.name.as_str()).collect();
    assert_eq!(names, vec!["Ada", "Grace"]);

    let failed = load_failed::<AuthorItem>(&dir).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error.kind, FailureKind::Transient);
    assert!(failed[0].error.is_retryable());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn load_completed_requires_upstream_output() {
    let err = load_completed::<AuthorItem, RecordRef>(&temp_dir())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.to_string().contains("upstream stage"));
}

#[tokio::test]
async fn load_results_of_missing_dir_is_empty() {
    let loaded: ResultSet<AuthorItem, RecordRef> = load_results(&temp_dir()).await.unwrap();
    assert_eq!(loaded.total(), 0);
}

#[test]
fn failed_entries_serialize_step_and_kind() {
    let results = sample();
    let value = serde_json::to_value(&results.failed).unwrap();
    assert_eq!(value[0]["error"]["step"], "create");
    assert_eq!(value[0]["error"]["kind"], "transient");
    assert_eq!(value[0]["item"]["name"], "Linus");
}
