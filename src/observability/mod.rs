//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Accept loop and connections produce:
//!     → logging.rs (structured log events, connection_id / peer fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Connection id flows through every per-connection event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
