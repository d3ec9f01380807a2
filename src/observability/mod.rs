//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers and the batch coordinator produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges via the metrics facade)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every state transition is logged with the breaker name
//! - Batches carry a UUID so their log lines can be correlated
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
