//! Integration tests for telemetry initialization and span helpers.

use wpcf_migrate::model::{FailureKind, ItemError, ItemResult, Outcome, Step};
use wpcf_migrate::telemetry::{TelemetryConfig, init_telemetry, metrics, work};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; another test
    // may have won the race, which is acceptable.
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: None,
        service_name: "wpcf-test".to_string(),
        default_level: "debug".to_string(),
    });
}

#[test]
fn item_span_records_each_settlement() {
    let span = work::start_item_span("assets", "hero.png");

    let done: ItemResult<u32> = Ok(Outcome::Done(1));
    work::record_settlement(&span, &done);

    let skipped: ItemResult<u32> = Ok(Outcome::Skipped(1));
    work::record_settlement(&span, &skipped);

    let failed: ItemResult<u32> = Err(ItemError::new(
        "hero.png",
        Step::Publish,
        FailureKind::Transient,
        "503",
    ));
    work::record_settlement(&span, &failed);
}

#[test]
fn metric_instruments_build_without_provider() {
    metrics::items_settled().add(1, &[]);
    metrics::destination_calls().add(1, &[]);
    metrics::item_duration_ms().record(12.5, &[]);
    metrics::index_records().add(3, &[]);
}
