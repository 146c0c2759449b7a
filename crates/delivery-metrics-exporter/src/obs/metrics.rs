//! Metrics store for the exporter.
//!
//! Every family lives inside one `Families` value guarded by a single `Mutex`.
//! Writers (the collector) hold the lock for a whole reset-and-repopulate, and
//! readers (the `/metrics` handler) hold it for a whole render, so a scrape
//! sees either the previous cycle or the next one, never a half-cleared gauge.
//!
//! Series keys are label *values* in the family's declared label order; the
//! `BTreeMap` keeps rendering deterministic. Histogram buckets are fixed in
//! microseconds to avoid floating point math.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use delivery_metrics_core::{
    CommitSummary, Domain, IssueSummary, PullRequestSummary, RepositorySummary,
};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// `k1="v1",k2="v2"` for one series.
fn label_str(names: &[&str], values: &[String]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

fn write_sample(out: &mut String, name: &str, labels: &str, value: impl std::fmt::Display) {
    if labels.is_empty() {
        let _ = writeln!(out, "{} {}", name, value);
    } else {
        let _ = writeln!(out, "{}{{{}}} {}", name, labels, value);
    }
}

fn key_of(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

struct CounterVec {
    labels: &'static [&'static str],
    map: BTreeMap<Vec<String>, u64>,
}

impl CounterVec {
    fn new(labels: &'static [&'static str]) -> Self {
        Self { labels, map: BTreeMap::new() }
    }

    /// Increment by 1.
    fn inc(&mut self, values: &[&str]) {
        self.add(values, 1);
    }

    fn add(&mut self, values: &[&str], v: u64) {
        debug_assert_eq!(values.len(), self.labels.len());
        *self.map.entry(key_of(values)).or_insert(0) += v;
    }

    fn get(&self, values: &[&str]) -> u64 {
        self.map.get(&key_of(values)).copied().unwrap_or(0)
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "counter");
        for (key, val) in &self.map {
            write_sample(out, name, &label_str(self.labels, key), val);
        }
    }
}

struct GaugeVec {
    labels: &'static [&'static str],
    map: BTreeMap<Vec<String>, i64>,
}

impl GaugeVec {
    fn new(labels: &'static [&'static str]) -> Self {
        Self { labels, map: BTreeMap::new() }
    }

    fn inc(&mut self, values: &[&str]) {
        debug_assert_eq!(values.len(), self.labels.len());
        *self.map.entry(key_of(values)).or_insert(0) += 1;
    }

    fn set(&mut self, values: &[&str], v: i64) {
        debug_assert_eq!(values.len(), self.labels.len());
        self.map.insert(key_of(values), v);
    }

    /// Drop every series; label sets absent from the next update disappear.
    fn reset(&mut self) {
        self.map.clear();
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "gauge");
        for (key, val) in &self.map {
            write_sample(out, name, &label_str(self.labels, key), val);
        }
    }
}

// 10ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s
const BUCKETS_MICROS: [u64; 10] = [
    10_000, 50_000, 100_000, 250_000, 500_000, 1_000_000, 2_500_000, 5_000_000, 10_000_000,
    30_000_000,
];

#[derive(Default)]
struct Histogram {
    count: u64,
    sum: u64,
    buckets: [u64; BUCKETS_MICROS.len()],
}

struct HistogramVec {
    labels: &'static [&'static str],
    map: BTreeMap<Vec<String>, Histogram>,
}

impl HistogramVec {
    fn new(labels: &'static [&'static str]) -> Self {
        Self { labels, map: BTreeMap::new() }
    }

    /// Observe a duration and increment cumulative buckets (microsecond scale).
    fn observe(&mut self, values: &[&str], duration: Duration) {
        debug_assert_eq!(values.len(), self.labels.len());
        let hist = self.map.entry(key_of(values)).or_default();
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count += 1;
        hist.sum = hist.sum.saturating_add(micros);
        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i] += 1;
            }
        }
    }

    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "histogram");
        let bucket_name = format!("{name}_bucket");
        for (key, hist) in &self.map {
            let labels = label_str(self.labels, key);
            let prefix = if labels.is_empty() { String::new() } else { format!("{},", labels) };

            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                write_sample(out, &bucket_name, &format!("{prefix}le=\"{le}\""), hist.buckets[i]);
            }
            write_sample(out, &bucket_name, &format!("{prefix}le=\"+Inf\""), hist.count);
            write_sample(out, &format!("{name}_sum"), &labels, hist.sum);
            write_sample(out, &format!("{name}_count"), &labels, hist.count);
        }
    }
}

struct Families {
    commits: CounterVec,
    pull_requests: GaugeVec,
    issues: GaugeVec,
    repositories: GaugeVec,

    cycles: CounterVec,
    fetch_errors: CounterVec,
    fetch_records: GaugeVec,
    last_success: GaugeVec,
    fetch_duration: HistogramVec,
    cycle_duration: HistogramVec,
}

impl Default for Families {
    fn default() -> Self {
        let mut fetch_errors = CounterVec::new(&["domain"]);
        // Export a zero for every domain so rate() works before the first failure.
        for domain in Domain::ALL {
            fetch_errors.add(&[domain.as_str()], 0);
        }

        Self {
            commits: CounterVec::new(&["author", "repo"]),
            pull_requests: GaugeVec::new(&["repo", "state", "author"]),
            issues: GaugeVec::new(&["project", "status", "assignee"]),
            repositories: GaugeVec::new(&["owner"]),
            cycles: CounterVec::new(&[]),
            fetch_errors,
            fetch_records: GaugeVec::new(&["domain"]),
            last_success: GaugeVec::new(&["domain"]),
            fetch_duration: HistogramVec::new(&["domain"]),
            cycle_duration: HistogramVec::new(&[]),
        }
    }
}

/// Process-lifetime aggregate of every exported series.
#[derive(Default)]
pub struct MetricsStore {
    families: Mutex<Families>,
    draining: AtomicBool,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a family half-written in a
    // way that matters more than losing the scrape feed, so keep serving.
    fn lock(&self) -> MutexGuard<'_, Families> {
        self.families.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the pull-request gauge with counts from `records`.
    pub fn update_pull_requests(&self, repo: &str, records: &[PullRequestSummary]) {
        let mut f = self.lock();
        f.pull_requests.reset();
        for pr in records {
            f.pull_requests.inc(&[repo, &pr.state, &pr.author]);
        }
    }

    /// Replace the issue gauge with counts from `records`.
    pub fn update_issues(&self, records: &[IssueSummary]) {
        let mut f = self.lock();
        f.issues.reset();
        for issue in records {
            f.issues.inc(&[&issue.project, &issue.status, &issue.assignee]);
        }
    }

    /// Replace the repository gauge with per-owner counts from `records`.
    pub fn update_repositories(&self, records: &[RepositorySummary]) {
        let mut f = self.lock();
        f.repositories.reset();
        for repo in records {
            f.repositories.inc(&[&repo.owner]);
        }
    }

    /// Add one to the commit counter per record.
    ///
    /// Commits are not deduplicated: submitting the same commit twice counts
    /// it twice. Callers own that.
    pub fn record_commits(&self, repo: &str, records: &[CommitSummary]) {
        let mut f = self.lock();
        for commit in records {
            f.commits.inc(&[&commit.author, repo]);
        }
    }

    pub fn record_fetch_success(&self, domain: Domain, count: usize, elapsed: Duration) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut f = self.lock();
        f.fetch_records
            .set(&[domain.as_str()], i64::try_from(count).unwrap_or(i64::MAX));
        f.last_success
            .set(&[domain.as_str()], i64::try_from(now).unwrap_or(i64::MAX));
        f.fetch_duration.observe(&[domain.as_str()], elapsed);
    }

    pub fn record_fetch_error(&self, domain: Domain, elapsed: Duration) {
        let mut f = self.lock();
        f.fetch_errors.inc(&[domain.as_str()]);
        f.fetch_duration.observe(&[domain.as_str()], elapsed);
    }

    /// Mark one collection cycle as finished.
    pub fn observe_cycle(&self, elapsed: Duration) {
        let mut f = self.lock();
        f.cycles.inc(&[]);
        f.cycle_duration.observe(&[], elapsed);
    }

    pub fn cycles_completed(&self) -> u64 {
        self.lock().cycles.get(&[])
    }

    pub fn fetch_errors(&self, domain: Domain) -> u64 {
        self.lock().fetch_errors.get(&[domain.as_str()])
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Render every family in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let f = self.lock();

        f.commits.render(
            "github_commits_total",
            "Total number of commits by author and repository.",
            &mut out,
        );
        f.pull_requests.render(
            "github_pull_requests_total",
            "Number of pull requests by repository, state and author.",
            &mut out,
        );
        f.repositories.render(
            "github_repositories",
            "Number of repositories visible per owner.",
            &mut out,
        );
        f.issues.render(
            "jira_issues_status_count",
            "Number of Jira issues by project, status and assignee.",
            &mut out,
        );

        f.cycles.render(
            "delivery_collection_cycles_total",
            "Completed collection cycles.",
            &mut out,
        );
        f.fetch_errors.render(
            "delivery_collection_errors_total",
            "Failed upstream fetches by domain.",
            &mut out,
        );
        f.fetch_records.render(
            "delivery_collection_records",
            "Records returned by the latest successful fetch, by domain.",
            &mut out,
        );
        f.last_success.render(
            "delivery_collection_last_success_timestamp_seconds",
            "Unix time of the latest successful fetch, by domain.",
            &mut out,
        );
        f.fetch_duration.render(
            "delivery_fetch_duration_micros",
            "Upstream fetch latency by domain in microseconds.",
            &mut out,
        );
        f.cycle_duration.render(
            "delivery_collection_duration_micros",
            "Collection cycle duration in microseconds.",
            &mut out,
        );
        drop(f);

        write_header(&mut out, "delivery_draining", "1 while the process shuts down.", "gauge");
        write_sample(&mut out, "delivery_draining", "", u8::from(self.is_draining()));
        out
    }
}
