//! Jira REST v2 search adapter (basic auth with email + API token).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use delivery_metrics_core::error::Result;
use delivery_metrics_core::record::UNASSIGNED;
use delivery_metrics_core::IssueSummary;

use super::http::{build_client, send_json};
use super::IssueTracker;
use crate::config::{JiraConfig, Secret};

const SERVICE: &str = "jira";
const MAX_RESULTS: &str = "100";
const FIELDS: &str = "assignee,status,project";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<ApiIssue>,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    key: String,
    #[serde(default)]
    fields: ApiFields,
}

#[derive(Debug, Default, Deserialize)]
struct ApiFields {
    #[serde(default)]
    assignee: Option<ApiUser>,
    #[serde(default)]
    status: Option<Named>,
    #[serde(default)]
    project: Option<Named>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

impl From<ApiIssue> for IssueSummary {
    fn from(issue: ApiIssue) -> Self {
        // Jira Cloud dropped `name` for privacy; fall back to the display name.
        let assignee = issue
            .fields
            .assignee
            .and_then(|u| u.name.or(u.display_name))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNASSIGNED.to_string());

        IssueSummary {
            key: issue.key,
            assignee,
            status: issue.fields.status.map(|s| s.name).unwrap_or_default(),
            project: issue.fields.project.map(|p| p.name).unwrap_or_default(),
        }
    }
}

pub struct JiraClient {
    http: Client,
    base_url: String,
    email: String,
    token: Secret,
}

impl JiraClient {
    pub fn new(cfg: &JiraConfig) -> Result<Self> {
        Ok(Self {
            http: build_client(SERVICE)?,
            base_url: cfg.url.clone(),
            email: cfg.email.clone(),
            token: cfg.api_token.clone(),
        })
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn fetch_issues(&self, query: &str) -> Result<Vec<IssueSummary>> {
        let url = format!("{}/rest/api/2/search", self.base_url);
        let req = self
            .http
            .get(&url)
            .basic_auth(&self.email, Some(self.token.expose()))
            .query(&[("jql", query), ("fields", FIELDS), ("maxResults", MAX_RESULTS)]);

        let what = format!("search \"{query}\"");
        let (resp, _): (SearchResponse, _) = send_json(SERVICE, &what, req).await?;
        Ok(resp.issues.into_iter().map(IssueSummary::from).collect())
    }
}
