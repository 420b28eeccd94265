//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Middleware and converter produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with key/value fields for machine parsing
//! - Request ID is attached to every conversion log line
//! - Metrics are cheap (atomic increments) and no-ops without an exporter

pub mod logging;
pub mod metrics;
