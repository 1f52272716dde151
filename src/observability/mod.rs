//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via tracing; one terminal line per relayed request
//! - Metrics are cheap (atomic increments behind the metrics facade)
//! - The Prometheus exporter is optional and lives on its own address

pub mod logging;
pub mod metrics;
