//! In-process metrics.
//!
//! Upstream delivery data and the exporter's own collection health are kept
//! in one lock-guarded store and rendered by the `/metrics` handler in
//! Prometheus text format.

pub mod metrics;

pub use metrics::MetricsStore;
