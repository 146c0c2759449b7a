//! Delivery metrics exporter library entry.
//!
//! This crate wires the GitHub and Jira source clients, the periodic
//! collector, and the metrics store into a Prometheus scrape target. It is
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod collector;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
pub mod server;
pub mod sources;
