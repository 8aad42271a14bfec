//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, bulkheads and managers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Service name is a field/label on every event
//! - Metrics are cheap (no-ops until a recorder is installed)

pub mod logging;
pub mod metrics;
