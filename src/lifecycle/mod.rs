//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config file (optional) → apply CLI overrides → Validate
//!
//! Shutdown (shutdown.rs):
//!     Signal received → trigger → supervisors close members
//!     → HTTP server stops accepting → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Members are closed before the listener goes away
//! - Late subscribers still observe a shutdown that already happened

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownListener};
