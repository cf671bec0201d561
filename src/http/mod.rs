//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → /connect        → upgrade.rs → registry create → supervisor
//!     → /connect-group  → upgrade.rs → registry join   → supervisor
//!     → anything else   → dispatch.rs
//!           Host label → registry lookup
//!           POST  → codec capture + encode → broadcast → 202
//!           other → 403
//!           no group → 404
//! ```

pub mod dispatch;
pub mod request;
pub mod server;
pub mod upgrade;

pub use request::{request_id, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
