//! Upstream source clients.
//!
//! The collector only sees the two traits below; `GithubClient` and
//! `JiraClient` are the production implementations and tests plug in fakes.

mod http;

pub mod github;
pub mod jira;

use async_trait::async_trait;

use delivery_metrics_core::error::Result;
use delivery_metrics_core::{CommitSummary, IssueSummary, PullRequestSummary, RepositorySummary};

pub use github::GithubClient;
pub use jira::JiraClient;

/// Source-code hosting platform, scoped to one owner and one repository.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Repository name used as the `repo` label.
    fn repository(&self) -> &str;
    async fn fetch_repositories(&self) -> Result<Vec<RepositorySummary>>;
    async fn fetch_pull_requests(&self) -> Result<Vec<PullRequestSummary>>;
    async fn fetch_commits(&self) -> Result<Vec<CommitSummary>>;
}

/// Issue-tracking platform.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn fetch_issues(&self, query: &str) -> Result<Vec<IssueSummary>>;
}
