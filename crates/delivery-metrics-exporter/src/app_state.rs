//! Shared state for the HTTP surface.
//!
//! Handlers only read from the metrics store; the collector is the sole
//! writer and holds its own `Arc`.

use std::sync::Arc;

use crate::obs::MetricsStore;

#[derive(Clone)]
pub struct AppState {
    metrics: Arc<MetricsStore>,
}

impl AppState {
    pub fn new(metrics: Arc<MetricsStore>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    pub fn is_draining(&self) -> bool {
        self.metrics.is_draining()
    }

    /// Ready once the first collection cycle has finished.
    pub fn is_warm(&self) -> bool {
        self.metrics.cycles_completed() > 0
    }
}
