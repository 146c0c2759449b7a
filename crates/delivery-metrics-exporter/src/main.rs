//! Delivery metrics exporter.
//!
//! - Polls GitHub (repositories, pull requests, optionally commits) and Jira
//!   (issues) on a fixed interval
//! - Serves the derived counts at `/metrics` for Prometheus
//! - SIGINT/SIGTERM: stop collecting, drain, exit within the grace period

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delivery_metrics_core::error::{DeliveryError, Result};
use delivery_metrics_exporter::{
    app_state::AppState,
    collector::{Collector, CollectorSettings},
    config::{self, ExporterConfig},
    obs::MetricsStore,
    server,
    sources::{GithubClient, JiraClient},
};

#[tokio::main]
async fn main() -> ExitCode {
    // Before the subscriber, so RUST_LOG may come from the file too.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => tracing::warn!("no .env file found, using process environment"),
        Err(e) => {
            tracing::error!(kind = "CONFIG", error = %e, "environment file invalid");
            return ExitCode::FAILURE;
        }
    }

    // Config errors must stop us before anything binds.
    let cfg = match config::load_from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), error = %e, "configuration invalid");
            return ExitCode::FAILURE;
        }
    };

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), error = %e, "exporter failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: ExporterConfig) -> Result<()> {
    let github = Arc::new(GithubClient::new(&cfg.github)?);
    let jira = Arc::new(JiraClient::new(&cfg.jira)?);
    let store = Arc::new(MetricsStore::new());
    let collector = Collector::new(
        github,
        jira,
        Arc::clone(&store),
        CollectorSettings::from_config(&cfg),
    );

    let shutdown = CancellationToken::new();
    let listener = server::bind(&cfg.server.listen).await?;
    let mut server = tokio::spawn(server::serve(
        listener,
        AppState::new(Arc::clone(&store)),
        shutdown.clone(),
    ));

    let interval = cfg.collector.interval;
    let cancel = shutdown.clone();
    let mut collector = tokio::spawn(async move { collector.run(cancel, interval).await });

    tracing::info!("application started, press Ctrl+C to exit");

    tokio::select! {
        res = &mut server => {
            shutdown.cancel();
            return match res {
                Ok(Ok(())) => Err(DeliveryError::Internal("metrics server exited unexpectedly".into())),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(DeliveryError::Internal(format!("metrics server task: {e}"))),
            };
        }
        _ = shutdown_signal() => {}
    }

    store.set_draining();
    shutdown.cancel();

    let grace = cfg.server.shutdown_grace;
    let drained = tokio::time::timeout(grace, async {
        let _ = (&mut collector).await;
        let _ = (&mut server).await;
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            grace = %humantime::format_duration(grace),
            "grace period elapsed, abandoning in-flight collection"
        );
        collector.abort();
        server.abort();
    }

    tracing::info!("application stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, stopping application");
}
