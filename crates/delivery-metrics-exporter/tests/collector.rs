#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use delivery_metrics_core::Domain;
use delivery_metrics_exporter::collector::{Collector, CollectorSettings, DomainOutcome};
use delivery_metrics_exporter::config::OverlapPolicy;
use delivery_metrics_exporter::obs::MetricsStore;

use support::{commit, issue, pr, series, FakeHost, FakeTracker};

fn settings(collect_commits: bool) -> CollectorSettings {
    CollectorSettings {
        overlap: OverlapPolicy::Skip,
        jql: "project = GT".into(),
        collect_commits,
    }
}

fn collector(host: &Arc<FakeHost>, tracker: &Arc<FakeTracker>, store: &Arc<MetricsStore>, commits: bool) -> Collector {
    Collector::new(host.clone(), tracker.clone(), Arc::clone(store), settings(commits))
}

async fn wait_for_cycles(store: &MetricsStore, n: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.cycles_completed() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("collection cycle did not finish in time");
}

#[tokio::test]
async fn one_cycle_updates_every_domain() {
    let host = Arc::new(FakeHost::new("widgets"));
    host.set_pulls(vec![pr("a", "x", 1, "open"), pr("b", "y", 2, "closed")]);
    let tracker = Arc::new(FakeTracker::default());
    tracker.set_issues(vec![issue("GT-1", "Gateway", "Open", "ann")]);
    let store = Arc::new(MetricsStore::new());

    let report = collector(&host, &tracker, &store, false).collect().await;

    assert_eq!(report.outcome(Domain::PullRequests), Some(&DomainOutcome::Updated(2)));
    assert_eq!(report.outcome(Domain::Issues), Some(&DomainOutcome::Updated(1)));
    assert_eq!(report.outcome(Domain::Repositories), Some(&DomainOutcome::Updated(1)));
    assert_eq!(report.outcome(Domain::Commits), Some(&DomainOutcome::Disabled));
    assert_eq!(report.failures(), 0);
    assert_eq!(store.cycles_completed(), 1);

    let out = store.render();
    assert_eq!(
        series(&out, "github_pull_requests_total"),
        vec![
            r#"github_pull_requests_total{repo="widgets",state="closed",author="b"} 1"#,
            r#"github_pull_requests_total{repo="widgets",state="open",author="a"} 1"#,
        ]
    );
    assert_eq!(
        series(&out, "jira_issues_status_count"),
        vec![r#"jira_issues_status_count{project="Gateway",status="Open",assignee="ann"} 1"#]
    );
    assert_eq!(tracker.queries(), vec!["project = GT".to_string()]);
}

#[tokio::test]
async fn issue_failure_does_not_block_code_host_domains() {
    let host = Arc::new(FakeHost::new("widgets"));
    host.set_pulls(vec![pr("a", "x", 1, "open")]);
    let tracker = Arc::new(FakeTracker::default());
    tracker.fail_with("503 Service Unavailable");
    let store = Arc::new(MetricsStore::new());

    let report = collector(&host, &tracker, &store, false).collect().await;

    assert!(matches!(report.outcome(Domain::Issues), Some(DomainOutcome::Failed(_))));
    assert_eq!(report.outcome(Domain::PullRequests), Some(&DomainOutcome::Updated(1)));
    assert_eq!(report.outcome(Domain::Repositories), Some(&DomainOutcome::Updated(1)));
    assert_eq!(store.fetch_errors(Domain::Issues), 1);
    assert_eq!(store.cycles_completed(), 1);
    assert_eq!(series(&store.render(), "github_pull_requests_total").len(), 1);
}

#[tokio::test]
async fn pull_request_failure_does_not_block_issues() {
    let host = Arc::new(FakeHost::new("widgets"));
    host.fail(Domain::PullRequests);
    let tracker = Arc::new(FakeTracker::default());
    tracker.set_issues(vec![issue("GT-1", "Gateway", "Open", "ann")]);
    let store = Arc::new(MetricsStore::new());

    let report = collector(&host, &tracker, &store, false).collect().await;

    assert_eq!(report.failures(), 1);
    assert!(matches!(report.outcome(Domain::PullRequests), Some(DomainOutcome::Failed(_))));
    assert_eq!(report.outcome(Domain::Issues), Some(&DomainOutcome::Updated(1)));
    assert_eq!(series(&store.render(), "jira_issues_status_count").len(), 1);
}

#[tokio::test]
async fn failed_fetch_keeps_previous_snapshot() {
    let host = Arc::new(FakeHost::new("widgets"));
    host.set_pulls(vec![pr("a", "x", 1, "open")]);
    let tracker = Arc::new(FakeTracker::default());
    let store = Arc::new(MetricsStore::new());
    let c = collector(&host, &tracker, &store, false);

    c.collect().await;
    host.fail(Domain::PullRequests);
    c.collect().await;

    assert_eq!(
        series(&store.render(), "github_pull_requests_total"),
        vec![r#"github_pull_requests_total{repo="widgets",state="open",author="a"} 1"#]
    );
    assert_eq!(store.fetch_errors(Domain::PullRequests), 1);
    assert_eq!(store.cycles_completed(), 2);
}

#[tokio::test]
async fn commits_are_collected_only_when_enabled() {
    let host = Arc::new(FakeHost::new("widgets"));
    host.set_commits(vec![commit("a", "1"), commit("a", "2")]);
    let tracker = Arc::new(FakeTracker::default());
    let store = Arc::new(MetricsStore::new());

    collector(&host, &tracker, &store, false).collect().await;
    assert_eq!(host.commit_calls(), 0);
    assert!(series(&store.render(), "github_commits_total").is_empty());

    let report = collector(&host, &tracker, &store, true).collect().await;
    assert_eq!(report.outcome(Domain::Commits), Some(&DomainOutcome::Updated(2)));
    assert_eq!(host.commit_calls(), 1);
    assert_eq!(
        series(&store.render(), "github_commits_total"),
        vec![r#"github_commits_total{author="a",repo="widgets"} 2"#]
    );
}

#[tokio::test]
async fn run_collects_immediately_then_stops_on_cancel() {
    let host = Arc::new(FakeHost::new("widgets"));
    let tracker = Arc::new(FakeTracker::default());
    let store = Arc::new(MetricsStore::new());
    let c = collector(&host, &tracker, &store, false);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { c.run(cancel, Duration::from_secs(3600)).await }
    });

    wait_for_cycles(&store, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.cycles_completed(), 1, "second cycle must wait for the interval");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("collector did not stop")
        .unwrap();
}

#[tokio::test]
async fn run_repeats_on_interval() {
    let host = Arc::new(FakeHost::new("widgets"));
    let tracker = Arc::new(FakeTracker::default());
    let store = Arc::new(MetricsStore::new());
    let c = collector(&host, &tracker, &store, false);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { c.run(cancel, Duration::from_millis(20)).await }
    });

    wait_for_cycles(&store, 3).await;
    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn cancel_lets_in_flight_cycle_finish() {
    let host = Arc::new(FakeHost::new("widgets").with_delay(Duration::from_millis(300)));
    host.set_pulls(vec![pr("a", "x", 1, "open")]);
    let tracker = Arc::new(FakeTracker::default());
    let store = Arc::new(MetricsStore::new());
    let c = collector(&host, &tracker, &store, false);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { c.run(cancel, Duration::from_secs(3600)).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.cycles_completed(), 0);
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("collector did not stop")
        .unwrap();
    assert_eq!(store.cycles_completed(), 1);
    assert_eq!(series(&store.render(), "github_pull_requests_total").len(), 1);
}

/// Cycles completed in one simulated second when every cycle takes 11ms and
/// the interval is 10ms.
async fn cycles_with_slow_host(overlap: OverlapPolicy) -> u64 {
    let host = Arc::new(FakeHost::new("widgets").with_delay(Duration::from_millis(11)));
    let tracker = Arc::new(FakeTracker::default());
    let store = Arc::new(MetricsStore::new());
    let c = Collector::new(
        host,
        tracker,
        Arc::clone(&store),
        CollectorSettings { overlap, ..settings(false) },
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { c.run(cancel, Duration::from_millis(10)).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    handle.await.unwrap();
    store.cycles_completed()
}

#[tokio::test(start_paused = true)]
async fn skip_drops_ticks_missed_by_a_slow_cycle() {
    // Each cycle overruns one tick, so only every other tick starts a cycle.
    let cycles = cycles_with_slow_host(OverlapPolicy::Skip).await;
    assert!((45..=55).contains(&cycles), "skip ran {cycles} cycles");
}

#[tokio::test(start_paused = true)]
async fn queue_replays_ticks_missed_by_a_slow_cycle() {
    let skipped = cycles_with_slow_host(OverlapPolicy::Skip).await;
    let queued = cycles_with_slow_host(OverlapPolicy::Queue).await;
    // Back to back: one cycle every 11ms instead of every 20ms.
    assert!(queued >= 80, "queue ran {queued} cycles");
    assert!(queued > skipped + 25, "queue {queued} vs skip {skipped}");
}
