//! # wpcf-migrate
//!
//! Migrates a WordPress site into a Contentful space.
//!
//! Downloads source collections, transforms them into upload items, then
//! pushes each item through a bounded-concurrency pipeline (existence
//! check, dependency resolution, create, publish) with rate-limited
//! destination calls and per-item deadlines. Stage results are persisted
//! so later stages, and re-runs, pick up where earlier ones left off.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod source;
pub mod stages;
pub mod store;
pub mod telemetry;
pub mod transform;
