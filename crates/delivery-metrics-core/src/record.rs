//! Normalized records produced by source clients.
//!
//! Records are transient: one collection cycle builds them, the metrics store
//! counts them, and they are dropped.

/// Author label used when the code host reports no linked account.
pub const UNKNOWN_AUTHOR: &str = "unknown";
/// Assignee label used when an issue has nobody assigned.
pub const UNASSIGNED: &str = "unassigned";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySummary {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub author: String,
    pub title: String,
    pub number: u64,
    /// Upstream state, kept opaque ("open", "closed", ...).
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub author: String,
    pub sha: String,
    /// Author date as reported upstream; empty when absent.
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSummary {
    pub key: String,
    pub assignee: String,
    pub status: String,
    /// Project display name; empty when absent.
    pub project: String,
}

/// Upstream data domains fetched once per collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    Repositories,
    PullRequests,
    Commits,
    Issues,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Repositories,
        Domain::PullRequests,
        Domain::Commits,
        Domain::Issues,
    ];

    /// Label value used in logs and self-observability series.
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Repositories => "repositories",
            Domain::PullRequests => "pull_requests",
            Domain::Commits => "commits",
            Domain::Issues => "issues",
        }
    }

    /// Upstream service that owns the domain.
    pub fn service(self) -> &'static str {
        match self {
            Domain::Repositories | Domain::PullRequests | Domain::Commits => "github",
            Domain::Issues => "jira",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
