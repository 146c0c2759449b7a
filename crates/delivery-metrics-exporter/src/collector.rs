//! Periodic collection loop.
//!
//! One cycle fetches every enabled domain concurrently and applies each
//! result to the metrics store on its own. A failing domain is logged and
//! counted; the others still land in the same cycle. Cycles run inline in
//! the loop, so two cycles never overlap; `OverlapPolicy` decides what
//! happens to ticks that fire while one is running.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use delivery_metrics_core::error::Result;
use delivery_metrics_core::Domain;

use crate::config::{ExporterConfig, OverlapPolicy};
use crate::obs::MetricsStore;
use crate::sources::{CodeHost, IssueTracker};

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub overlap: OverlapPolicy,
    /// JQL passed to the issue tracker each cycle.
    pub jql: String,
    pub collect_commits: bool,
}

impl CollectorSettings {
    pub fn from_config(cfg: &ExporterConfig) -> Self {
        Self {
            overlap: cfg.collector.overlap,
            jql: cfg.jira.jql.clone(),
            collect_commits: cfg.github.collect_commits,
        }
    }
}

/// Result of one domain within one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainOutcome {
    /// Fetch succeeded and the store was updated with this many records.
    Updated(usize),
    /// Fetch failed; the store keeps the previous values for this domain.
    Failed(String),
    /// Domain is turned off by configuration.
    Disabled,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcomes: Vec<(Domain, DomainOutcome)>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn outcome(&self, domain: Domain) -> Option<&DomainOutcome> {
        self.outcomes.iter().find(|(d, _)| *d == domain).map(|(_, o)| o)
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DomainOutcome::Failed(_)))
            .count()
    }
}

pub struct Collector {
    code_host: Arc<dyn CodeHost>,
    tracker: Arc<dyn IssueTracker>,
    store: Arc<MetricsStore>,
    settings: CollectorSettings,
}

impl Collector {
    pub fn new(
        code_host: Arc<dyn CodeHost>,
        tracker: Arc<dyn IssueTracker>,
        store: Arc<MetricsStore>,
        settings: CollectorSettings,
    ) -> Self {
        Self { code_host, tracker, store, settings }
    }

    /// Collect now, then once per `interval`, until `cancel` fires.
    ///
    /// Cancellation is checked at tick boundaries. A cycle already in flight
    /// runs to completion; the caller bounds that wait with its grace period.
    pub async fn run(&self, cancel: CancellationToken, interval: Duration) {
        // The first tick of a tokio interval completes immediately.
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(self.settings.overlap.missed_tick_behavior());

        tracing::info!(
            interval = %humantime::format_duration(interval),
            overlap = ?self.settings.overlap,
            commits = self.settings.collect_commits,
            "collector started"
        );

        let mut cycle: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }

            cycle += 1;
            let report = self
                .collect()
                .instrument(tracing::info_span!("collection_cycle", cycle))
                .await;
            tracing::info!(
                cycle,
                failures = report.failures(),
                elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                "data collection finished"
            );
        }

        tracing::info!("collector stopped");
    }

    /// Perform a single collection cycle.
    pub async fn collect(&self) -> CycleReport {
        let started = Instant::now();
        let repo = self.code_host.repository();

        let (repositories, pull_requests, commits, issues) = tokio::join!(
            self.apply(Domain::Repositories, self.code_host.fetch_repositories(), |store, records| {
                tracing::debug!(repos = ?records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), "repositories");
                store.update_repositories(records)
            }),
            self.apply(Domain::PullRequests, self.code_host.fetch_pull_requests(), |store, records| {
                store.update_pull_requests(repo, records)
            }),
            async {
                if self.settings.collect_commits {
                    self.apply(Domain::Commits, self.code_host.fetch_commits(), |store, records| {
                        store.record_commits(repo, records)
                    })
                    .await
                } else {
                    DomainOutcome::Disabled
                }
            },
            self.apply(Domain::Issues, self.tracker.fetch_issues(&self.settings.jql), |store, records| {
                store.update_issues(records)
            }),
        );

        let elapsed = started.elapsed();
        self.store.observe_cycle(elapsed);

        CycleReport {
            outcomes: vec![
                (Domain::Repositories, repositories),
                (Domain::PullRequests, pull_requests),
                (Domain::Commits, commits),
                (Domain::Issues, issues),
            ],
            elapsed,
        }
    }

    async fn apply<T, Fut, F>(&self, domain: Domain, fetch: Fut, update: F) -> DomainOutcome
    where
        Fut: Future<Output = Result<Vec<T>>>,
        F: FnOnce(&MetricsStore, &[T]),
    {
        let started = Instant::now();
        match fetch.await {
            Ok(records) => {
                let count = records.len();
                update(self.store.as_ref(), records.as_slice());
                self.store.record_fetch_success(domain, count, started.elapsed());
                tracing::info!(%domain, service = domain.service(), count, "fetched records");
                DomainOutcome::Updated(count)
            }
            Err(e) => {
                self.store.record_fetch_error(domain, started.elapsed());
                tracing::error!(
                    %domain,
                    service = domain.service(),
                    kind = e.kind().as_str(),
                    error = %e,
                    "fetch failed, keeping previous values"
                );
                DomainOutcome::Failed(e.to_string())
            }
        }
    }
}
