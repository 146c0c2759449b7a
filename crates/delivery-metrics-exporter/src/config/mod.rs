//! Exporter config loader (environment variables, strict parsing).
//!
//! Empty values count as unset. Every missing required variable is reported
//! in one error so operators fix them in one pass.

pub mod schema;

use std::time::Duration;

use delivery_metrics_core::error::{DeliveryError, Result};

pub use schema::{
    CollectorConfig, ExporterConfig, GithubConfig, JiraConfig, OverlapPolicy, Secret,
    ServerConfig,
};

const REQUIRED: [&str; 6] = [
    "GITHUB_TOKEN",
    "GITHUB_OWNER",
    "GITHUB_REPO",
    "JIRA_URL",
    "JIRA_EMAIL",
    "JIRA_API_TOKEN",
];

pub fn load_from_env() -> Result<ExporterConfig> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Build the config from any key lookup; `load_from_env` passes the process
/// environment, tests pass a map.
pub fn load_from_lookup<F>(lookup: F) -> Result<ExporterConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let missing: Vec<&'static str> = REQUIRED.into_iter().filter(|k| get(*k).is_none()).collect();
    if !missing.is_empty() {
        return Err(DeliveryError::MissingConfig(missing));
    }
    let required = |key: &'static str| get(key).ok_or_else(|| DeliveryError::MissingConfig(vec![key]));

    let github = GithubConfig {
        token: Secret::new(required("GITHUB_TOKEN")?),
        owner: required("GITHUB_OWNER")?,
        repo: required("GITHUB_REPO")?,
        api_url: get("GITHUB_API_URL")
            .unwrap_or_else(|| schema::DEFAULT_GITHUB_API_URL.to_string())
            .trim_end_matches('/')
            .to_string(),
        collect_commits: get("GITHUB_COLLECT_COMMITS")
            .map(|v| parse_bool("GITHUB_COLLECT_COMMITS", &v))
            .transpose()?
            .unwrap_or(false),
    };

    let jira = JiraConfig {
        url: required("JIRA_URL")?.trim_end_matches('/').to_string(),
        email: required("JIRA_EMAIL")?,
        api_token: Secret::new(required("JIRA_API_TOKEN")?),
        jql: get("JIRA_JQL").unwrap_or_else(|| schema::DEFAULT_JQL.to_string()),
    };

    let collector = CollectorConfig {
        interval: get("COLLECTION_INTERVAL")
            .map(|v| parse_duration("COLLECTION_INTERVAL", &v))
            .transpose()?
            .unwrap_or_else(schema::default_interval),
        overlap: get("COLLECTION_OVERLAP")
            .map(|v| OverlapPolicy::parse(&v))
            .transpose()?
            .unwrap_or_default(),
    };

    let server = ServerConfig {
        listen: get("SERVER_ADDR")
            .map(|v| parse_listen(&v))
            .transpose()?
            .unwrap_or_else(|| ServerConfig::default().listen),
        shutdown_grace: get("SHUTDOWN_GRACE")
            .map(|v| parse_duration("SHUTDOWN_GRACE", &v))
            .transpose()?
            .unwrap_or_else(schema::default_shutdown_grace),
    };

    let cfg = ExporterConfig { github, jira, collector, server };
    cfg.validate()?;
    Ok(cfg)
}

/// Durations use humantime syntax: `90s`, `1m`, `1h 30m`.
pub fn parse_duration(var: &str, raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| DeliveryError::Config(format!("invalid format for {var} \"{raw}\": {e}")))
}

/// Accepts `host:port` (hostname or IP) and the bare `:port` shorthand (all
/// interfaces). Hostnames are resolved when the listener binds.
pub fn parse_listen(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let full = if raw.starts_with(':') { format!("0.0.0.0{raw}") } else { raw.to_string() };
    let invalid = |why: &str| DeliveryError::Config(format!("SERVER_ADDR \"{raw}\" {why}"));

    let (host, port) = full.rsplit_once(':').ok_or_else(|| invalid("must be host:port or :port"))?;
    if host.is_empty() {
        return Err(invalid("has an empty host"));
    }
    port.parse::<u16>().map_err(|_| invalid("has an invalid port"))?;
    Ok(full)
}

fn parse_bool(var: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DeliveryError::Config(format!("{var} must be a boolean, got \"{raw}\""))),
    }
}
