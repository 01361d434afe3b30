//! Metric instrument factories for wpcf-migrate.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"wpcf-migrate"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for wpcf-migrate instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("wpcf-migrate")
}

/// Counter: work items settled by the pool.
/// Labels: `stage`, `status` ("done" | "skipped" | "failed").
pub fn items_settled() -> Counter<u64> {
    meter()
        .u64_counter("migrate.items.settled")
        .with_description("Number of work items settled")
        .build()
}

/// Counter: calls made to the destination store.
/// Labels: `operation` (pipeline step name).
pub fn destination_calls() -> Counter<u64> {
    meter()
        .u64_counter("migrate.destination.calls")
        .with_description("Number of destination store calls")
        .build()
}

/// Histogram: wall time from claim to settlement, in milliseconds.
/// Labels: `stage`.
pub fn item_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("migrate.item.duration_ms")
        .with_description("Per-item processing duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: records loaded into existing-record indexes.
/// Labels: `content_type`.
pub fn index_records() -> Counter<u64> {
    meter()
        .u64_counter("migrate.index.records")
        .with_description("Records loaded into existing-record indexes")
        .build()
}
