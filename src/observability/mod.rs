//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout/stderr log stream
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (group key, member handle, cause) on every session event
//! - Request ID flows from the HTTP layer into dispatch logs
//! - Metrics are cheap (atomic increments) and a no-op until an exporter is installed

pub mod logging;
pub mod metrics;
