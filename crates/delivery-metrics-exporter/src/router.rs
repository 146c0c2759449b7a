//! Axum router wiring for the scrape and probe endpoints.

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops};

pub const METRICS_PATH: &str = "/metrics";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(METRICS_PATH, get(ops::metrics))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .with_state(state)
}
