//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging via `tracing` fields, never token values
//! - Request ID flows through every log line of a request
//! - Metrics are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
