//! # tracehook-metrics
//!
//! Session metrics aggregation for tracehook.
//!
//! This crate provides:
//! - A pure summary of an event log (counts by agent type and model)
//! - The aggregator behind the end-of-turn hook, which persists the summary
//! - The console digest

pub mod aggregate;
pub mod digest;

pub use aggregate::{summarize, MetricsAggregator};
pub use digest::render_digest;
