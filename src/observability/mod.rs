//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! relay, interceptors, supervisor
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (text or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to every relay log line
//! - Metrics are cheap (atomic increments) and no-ops until the exporter is installed

pub mod logging;
pub mod metrics;
