//! GitHub REST v3 adapter.
//!
//! - repositories: every page of the owner's organization listing
//! - pull requests: one page (100) of all states
//! - commits: one page (100) of the default branch

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, LINK};
use reqwest::Client;
use serde::Deserialize;

use delivery_metrics_core::error::Result;
use delivery_metrics_core::record::UNKNOWN_AUTHOR;
use delivery_metrics_core::{CommitSummary, PullRequestSummary, RepositorySummary};

use super::http::{build_client, send_json};
use super::CodeHost;
use crate::config::{GithubConfig, Secret};

const SERVICE: &str = "github";
const PER_PAGE: &str = "100";
/// Pagination stops here even if the server keeps advertising a next page.
/// Upper bound on pages followed when listing an owner's repositories.
pub const MAX_PAGES: usize = 50;

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    name: String,
    #[serde(default)]
    owner: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiPull {
    number: u64,
    #[serde(default)]
    title: String,
    state: String,
    #[serde(default)]
    user: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    #[serde(default)]
    author: Option<ApiUser>,
    #[serde(default)]
    commit: Option<ApiCommitDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    #[serde(default)]
    author: Option<ApiSignature>,
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    #[serde(default)]
    date: Option<String>,
}

fn login_or_unknown(user: Option<ApiUser>) -> String {
    user.map(|u| u.login).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(LINK)?.to_str().ok()?;
    raw.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|s| s.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

pub struct GithubClient {
    http: Client,
    api_url: String,
    owner: String,
    repo: String,
    token: Secret,
}

impl GithubClient {
    pub fn new(cfg: &GithubConfig) -> Result<Self> {
        Ok(Self {
            http: build_client(SERVICE)?,
            api_url: cfg.api_url.clone(),
            owner: cfg.owner.clone(),
            repo: cfg.repo.clone(),
            token: cfg.token.clone(),
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(self.token.expose())
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

#[async_trait]
impl CodeHost for GithubClient {
    fn repository(&self) -> &str {
        &self.repo
    }

    async fn fetch_repositories(&self) -> Result<Vec<RepositorySummary>> {
        let mut out = Vec::new();
        let first = format!("{}/orgs/{}/repos", self.api_url, self.owner);
        let (mut page, mut headers): (Vec<ApiRepo>, HeaderMap) = send_json(
            SERVICE,
            "list repositories",
            self.get(&first).query(&[("per_page", PER_PAGE)]),
        )
        .await?;

        let mut pages = 1;
        loop {
            out.extend(page.drain(..).filter_map(|r| {
                r.owner.map(|o| RepositorySummary { owner: o.login, name: r.name })
            }));

            let Some(next) = next_link(&headers) else { break };
            if pages >= MAX_PAGES {
                tracing::warn!(
                    owner = %self.owner,
                    pages,
                    repositories = out.len(),
                    "repository listing truncated at page limit"
                );
                break;
            }
            (page, headers) = send_json(SERVICE, "list repositories", self.get(&next)).await?;
            pages += 1;
        }

        Ok(out)
    }

    async fn fetch_pull_requests(&self) -> Result<Vec<PullRequestSummary>> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_url, self.owner, self.repo);
        let (pulls, _): (Vec<ApiPull>, _) = send_json(
            SERVICE,
            "list pull requests",
            self.get(&url).query(&[("state", "all"), ("per_page", PER_PAGE)]),
        )
        .await?;

        Ok(pulls
            .into_iter()
            .map(|p| PullRequestSummary {
                author: login_or_unknown(p.user),
                title: p.title,
                number: p.number,
                state: p.state,
            })
            .collect())
    }

    async fn fetch_commits(&self) -> Result<Vec<CommitSummary>> {
        let url = format!("{}/repos/{}/{}/commits", self.api_url, self.owner, self.repo);
        let (commits, _): (Vec<ApiCommit>, _) = send_json(
            SERVICE,
            "list commits",
            self.get(&url).query(&[("per_page", PER_PAGE)]),
        )
        .await?;

        Ok(commits
            .into_iter()
            .map(|c| CommitSummary {
                author: login_or_unknown(c.author),
                sha: c.sha,
                date: c
                    .commit
                    .and_then(|d| d.author)
                    .and_then(|a| a.date)
                    .unwrap_or_default(),
            })
            .collect())
    }
}
