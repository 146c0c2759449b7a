//! Shared error type across delivery-metrics crates.

use thiserror::Error;

/// Stable error codes, used as a structured logging field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration value is present but invalid.
    Config,
    /// One or more required configuration values are absent.
    MissingConfig,
    /// An upstream service call failed or returned something unusable.
    Upstream,
    /// The metrics listener could not be bound or failed while serving.
    Bind,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG",
            ErrorKind::MissingConfig => "MISSING_CONFIG",
            ErrorKind::Upstream => "UPSTREAM",
            ErrorKind::Bind => "BIND",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Unified error type used by core and exporter.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingConfig(Vec<&'static str>),
    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },
    #[error("failed to bind metrics listener on {addr}: {message}")]
    Bind { addr: String, message: String },
    #[error("internal: {0}")]
    Internal(String),
}

impl DeliveryError {
    /// Helper for source clients.
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        DeliveryError::Upstream {
            service,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DeliveryError::Config(_) => ErrorKind::Config,
            DeliveryError::MissingConfig(_) => ErrorKind::MissingConfig,
            DeliveryError::Upstream { .. } => ErrorKind::Upstream,
            DeliveryError::Bind { .. } => ErrorKind::Bind,
            DeliveryError::Internal(_) => ErrorKind::Internal,
        }
    }
}
