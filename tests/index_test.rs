//! Integration tests for the existing-record index.

use serde_json::json;
use wpcf_migrate::engine::{ExistingIndex, KeyField, RateGate, fetch_all};
use wpcf_migrate::model::Fields;
use wpcf_migrate::store::memory::Op;
use wpcf_migrate::store::{MemoryStore, Query};

const LOCALE: &str = "en-US";

fn titled(title: &str) -> Fields {
    Fields::new().with("title", LOCALE, title)
}

#[tokio::test]
async fn build_pages_past_the_page_limit() {
    let store = MemoryStore::new();
    for n in 0..2500 {
        store.seed_entry("asset", titled(&format!("image-{n}")));
    }

    let index = ExistingIndex::build(
        &store,
        &RateGate::disabled(),
        Query::entries("asset"),
        &KeyField::field("title"),
        LOCALE,
    )
    .await
    .unwrap();

    assert_eq!(index.len(), 2500);
    assert!(index.contains("image-0"));
    assert!(index.contains("image-2499"));
    assert_eq!(store.calls(Op::Query), 3);
}

#[tokio::test]
async fn build_only_indexes_the_queried_type() {
    let store = MemoryStore::new();
    store.seed_entry("author", Fields::new().with("name", LOCALE, "Ada"));
    store.seed_entry("topic", Fields::new().with("name", LOCALE, "Grace"));

    let index = ExistingIndex::build(
        &store,
        &RateGate::disabled(),
        Query::entries("author"),
        &KeyField::field("name"),
        LOCALE,
    )
    .await
    .unwrap();

    assert_eq!(index.len(), 1);
    assert!(index.get("Ada").is_some());
    assert!(index.get("Grace").is_none());
}

#[tokio::test]
async fn records_without_the_key_are_skipped() {
    let store = MemoryStore::new();
    store.seed_entry("asset", titled("kept"));
    store.seed_entry("asset", Fields::new().with("altText", LOCALE, "no title"));
    store.seed_entry("asset", Fields::new().with("title", "de-DE", "other locale"));

    let index = ExistingIndex::build(
        &store,
        &RateGate::disabled(),
        Query::entries("asset"),
        &KeyField::field("title"),
        LOCALE,
    )
    .await
    .unwrap();

    assert_eq!(index.len(), 1);
    assert!(index.contains("kept"));
}

#[tokio::test]
async fn duplicate_keys_keep_the_first_record() {
    let store = MemoryStore::new();
    let first = store.seed_entry("asset", titled("twin"));
    store.seed_entry("asset", titled("twin"));

    let index = ExistingIndex::build(
        &store,
        &RateGate::disabled(),
        Query::entries("asset"),
        &KeyField::field("title"),
        LOCALE,
    )
    .await
    .unwrap();

    assert_eq!(index.len(), 1);
    assert_eq!(index.get("twin").unwrap().id(), first.id());
}

#[tokio::test]
async fn nested_key_reads_file_name() {
    let store = MemoryStore::new();
    store.seed_asset(Fields::new().with(
        "file",
        LOCALE,
        json!({ "fileName": "hero.png", "url": "//cdn/hero.png" }),
    ));

    let index = ExistingIndex::build(
        &store,
        &RateGate::disabled(),
        Query::assets(),
        &KeyField::nested("file", "fileName"),
        LOCALE,
    )
    .await
    .unwrap();

    assert!(index.contains("hero.png"));
    assert_eq!(KeyField::nested("file", "fileName").to_string(), "file.fileName");
}

#[tokio::test]
async fn page_failure_aborts_the_build() {
    let store = MemoryStore::new();
    store.seed_entry("asset", titled("a"));
    store.fail_when(Op::Query, "asset", 500);

    let result = ExistingIndex::build(
        &store,
        &RateGate::disabled(),
        Query::entries("asset"),
        &KeyField::field("title"),
        LOCALE,
    )
    .await;

    let err = result.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn fetch_all_applies_filters() {
    let store = MemoryStore::new();
    store.seed_entry("articlePage", Fields::new().with("slug", LOCALE, "/blog/tax-day"));
    store.seed_entry("articlePage", Fields::new().with("slug", LOCALE, "/blog/refunds"));

    let exact = fetch_all(
        &store,
        &RateGate::disabled(),
        Query::entries("articlePage").filter("fields.slug", "/blog/refunds"),
    )
    .await
    .unwrap();
    assert_eq!(exact.len(), 1);

    let substring = fetch_all(
        &store,
        &RateGate::disabled(),
        Query::entries("articlePage").filter("fields.slug[match]", "/blog/"),
    )
    .await
    .unwrap();
    assert_eq!(substring.len(), 2);
}

#[test]
fn from_records_indexes_in_hand() {
    let store = MemoryStore::new();
    let a = store.seed_entry("author", Fields::new().with("name", LOCALE, "Ada"));
    let index = ExistingIndex::from_records(vec![a.clone()], &KeyField::field("name"), LOCALE);
    assert_eq!(index.get("Ada"), Some(&a));
    assert!(!index.is_empty());
}
