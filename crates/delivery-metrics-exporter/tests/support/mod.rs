//! Fake source clients and render helpers shared by integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use delivery_metrics_core::error::{DeliveryError, Result};
use delivery_metrics_core::{
    CommitSummary, Domain, IssueSummary, PullRequestSummary, RepositorySummary,
};
use delivery_metrics_exporter::sources::{CodeHost, IssueTracker};

pub fn pr(author: &str, title: &str, number: u64, state: &str) -> PullRequestSummary {
    PullRequestSummary {
        author: author.into(),
        title: title.into(),
        number,
        state: state.into(),
    }
}

pub fn issue(key: &str, project: &str, status: &str, assignee: &str) -> IssueSummary {
    IssueSummary {
        key: key.into(),
        assignee: assignee.into(),
        status: status.into(),
        project: project.into(),
    }
}

pub fn commit(author: &str, sha: &str) -> CommitSummary {
    CommitSummary { author: author.into(), sha: sha.into(), date: String::new() }
}

/// Sample lines of one family (no comments, no other families).
pub fn series(rendered: &str, family: &str) -> Vec<String> {
    let labeled = format!("{family}{{");
    let bare = format!("{family} ");
    rendered
        .lines()
        .filter(|l| l.starts_with(&labeled) || l.starts_with(&bare))
        .map(str::to_string)
        .collect()
}

pub struct FakeHost {
    repo: String,
    pulls: Mutex<Vec<PullRequestSummary>>,
    commits: Mutex<Vec<CommitSummary>>,
    failing: Mutex<Vec<Domain>>,
    delay: Option<Duration>,
    commit_calls: AtomicUsize,
}

impl FakeHost {
    pub fn new(repo: &str) -> Self {
        Self {
            repo: repo.into(),
            pulls: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
            delay: None,
            commit_calls: AtomicUsize::new(0),
        }
    }

    /// Every pull-request fetch sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_pulls(&self, pulls: Vec<PullRequestSummary>) {
        *self.pulls.lock().unwrap() = pulls;
    }

    pub fn set_commits(&self, commits: Vec<CommitSummary>) {
        *self.commits.lock().unwrap() = commits;
    }

    pub fn fail(&self, domain: Domain) {
        self.failing.lock().unwrap().push(domain);
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    fn check(&self, domain: Domain) -> Result<()> {
        if self.failing.lock().unwrap().contains(&domain) {
            return Err(DeliveryError::upstream("github", format!("{domain} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl CodeHost for FakeHost {
    fn repository(&self) -> &str {
        &self.repo
    }

    async fn fetch_repositories(&self) -> Result<Vec<RepositorySummary>> {
        self.check(Domain::Repositories)?;
        Ok(vec![RepositorySummary { owner: "acme".into(), name: self.repo.clone() }])
    }

    async fn fetch_pull_requests(&self) -> Result<Vec<PullRequestSummary>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.check(Domain::PullRequests)?;
        Ok(self.pulls.lock().unwrap().clone())
    }

    async fn fetch_commits(&self) -> Result<Vec<CommitSummary>> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Domain::Commits)?;
        Ok(self.commits.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeTracker {
    issues: Mutex<Vec<IssueSummary>>,
    failure: Mutex<Option<String>>,
    queries: Mutex<Vec<String>>,
}

impl FakeTracker {
    pub fn set_issues(&self, issues: Vec<IssueSummary>) {
        *self.issues.lock().unwrap() = issues;
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.into());
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn fetch_issues(&self, query: &str) -> Result<Vec<IssueSummary>> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(DeliveryError::upstream("jira", message));
        }
        Ok(self.issues.lock().unwrap().clone())
    }
}
