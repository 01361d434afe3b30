//! Work item span helpers.
//!
//! Provides span creation and settlement recording for items flowing
//! through the worker pool.

use tracing::Span;

use crate::model::{ItemResult, Outcome};

/// Start a span for one item's upload pipeline.
///
/// The `item.status` field is declared empty and filled by
/// [`record_settlement`].
pub fn start_item_span(stage: &str, key: &str) -> Span {
    tracing::info_span!(
        "item.upload",
        "item.stage" = stage,
        "item.key" = key,
        "item.status" = tracing::field::Empty,
    )
}

/// Record an item's terminal classification on its span.
pub fn record_settlement<R>(span: &Span, result: &ItemResult<R>) {
    let status = match result {
        Ok(Outcome::Done(_)) => "done",
        Ok(Outcome::Skipped(_)) => "skipped",
        Err(_) => "failed",
    };
    span.record("item.status", status);
    span.in_scope(|| match result {
        Err(e) => tracing::warn!(step = %e.step, kind = ?e.kind, error = %e.message, "item failed"),
        Ok(_) => tracing::debug!(status, "item settled"),
    });
}
