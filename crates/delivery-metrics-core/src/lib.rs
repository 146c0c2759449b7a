//! delivery-metrics core: record types, collection domains, and the error type.
//!
//! This crate defines the normalized records that source clients hand to the
//! metrics store, plus the error surface shared by the exporter. It carries no
//! runtime or HTTP dependencies so the records can be built in tests and by
//! alternative source implementations alike.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod record;

/// Shared result type.
pub use error::{DeliveryError, Result};
pub use record::{CommitSummary, Domain, IssueSummary, PullRequestSummary, RepositorySummary};
