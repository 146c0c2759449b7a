//! Metrics listener.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use delivery_metrics_core::error::{DeliveryError, Result};

use crate::{app_state::AppState, router};

/// Bind `addr` and serve until `shutdown` is cancelled.
///
/// A bind failure comes back as `DeliveryError::Bind`; the entrypoint treats
/// it as fatal.
pub async fn expose(addr: &str, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let listener = bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// `addr` is `host:port`; hostnames are resolved here.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|e| DeliveryError::Bind {
        addr: addr.to_string(),
        message: e.to_string(),
    })
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|e| DeliveryError::Internal(format!("listener address: {e}")))?;
    tracing::info!(%local, path = router::METRICS_PATH, "metrics server listening");

    axum::serve(listener, router::build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| DeliveryError::Internal(format!("metrics server failed: {e}")))?;

    tracing::info!("metrics server stopped");
    Ok(())
}
