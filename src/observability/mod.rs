//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Budget ledger, breakers and the gate produce:
//!     → logging.rs (structured log events with tenant / dependency fields)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, plain or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Request payloads are never logged, only tenant and dependency keys
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
