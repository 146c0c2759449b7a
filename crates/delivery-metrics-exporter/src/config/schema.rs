use std::fmt;
use std::time::Duration;

use delivery_metrics_core::error::{DeliveryError, Result};

/// Credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub github: GithubConfig,
    pub jira: JiraConfig,
    pub collector: CollectorConfig,
    pub server: ServerConfig,
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        self.github.validate()?;
        self.jira.validate()?;
        self.collector.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: Secret,
    pub owner: String,
    pub repo: String,
    pub api_url: String,
    /// Commits are counted without deduplication, so this is opt-in.
    pub collect_commits: bool,
}

impl GithubConfig {
    pub fn validate(&self) -> Result<()> {
        validate_http_url("GITHUB_API_URL", &self.api_url)
    }
}

#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub url: String,
    pub email: String,
    pub api_token: Secret,
    pub jql: String,
}

impl JiraConfig {
    pub fn validate(&self) -> Result<()> {
        validate_http_url("JIRA_URL", &self.url)?;
        if self.jql.trim().is_empty() {
            return Err(DeliveryError::Config("JIRA_JQL must not be blank".into()));
        }
        Ok(())
    }
}

/// What the collector does with ticks that fire while a cycle is running.
///
/// Cycles never overlap either way; this only decides whether missed ticks
/// are dropped or replayed once the running cycle ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Drop missed ticks and wait for the next aligned one.
    #[default]
    Skip,
    /// Run one cycle per missed tick, back to back.
    Queue,
}

impl OverlapPolicy {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OverlapPolicy::Skip),
            "queue" => Ok(OverlapPolicy::Queue),
            other => Err(DeliveryError::Config(format!(
                "COLLECTION_OVERLAP must be \"skip\" or \"queue\", got \"{other}\""
            ))),
        }
    }

    pub fn missed_tick_behavior(self) -> tokio::time::MissedTickBehavior {
        match self {
            OverlapPolicy::Skip => tokio::time::MissedTickBehavior::Skip,
            OverlapPolicy::Queue => tokio::time::MissedTickBehavior::Burst,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub interval: Duration,
    pub overlap: OverlapPolicy,
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(DeliveryError::Config(
                "COLLECTION_INTERVAL must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `host:port`; the host may be a name.
    pub listen: String,
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: format!("0.0.0.0:{DEFAULT_PORT}"),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

fn validate_http_url(var: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(DeliveryError::Config(format!(
            "{var} must be an http(s) URL, got \"{url}\""
        )))
    }
}

pub const DEFAULT_PORT: u16 = 9091;
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_JQL: &str = "order by updated DESC";

pub(crate) fn default_interval() -> Duration {
    Duration::from_secs(60)
}

pub(crate) fn default_shutdown_grace() -> Duration {
    Duration::from_secs(2)
}
