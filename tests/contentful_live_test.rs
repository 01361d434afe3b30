//! Live tests against a real Contentful space.
//!
//! Require `CONTENTFUL_CMA_TOKEN` and `CONTENTFUL_SPACE_ID`; run with
//! `cargo test --test contentful_live_test -- --ignored`.

use wpcf_migrate::config::ContentfulConfig;
use wpcf_migrate::engine::{ExistingIndex, KeyField, RateGate};
use wpcf_migrate::store::{ContentfulClient, Query, RecordService};

fn client() -> ContentfulClient {
    dotenvy::dotenv().ok();
    let config = ContentfulConfig::from_env().expect("CONTENTFUL_* must be set");
    ContentfulClient::new(&config).expect("failed to build client")
}

#[tokio::test]
#[ignore]
async fn live_query_returns_a_page() {
    let client = client();
    let page = client
        .query(&Query::entries("author").page(0, 1))
        .await
        .unwrap();
    assert!(page.items.len() as u64 <= page.total.max(1));
}

#[tokio::test]
#[ignore]
async fn live_index_builds_for_authors() {
    let client = client();
    let index = ExistingIndex::build(
        &client,
        &RateGate::default(),
        Query::entries("author"),
        &KeyField::field("name"),
        "en-US",
    )
    .await
    .unwrap();
    println!("indexed {} author(s)", index.len());
}
