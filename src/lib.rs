//! Webhook relay library.
//!
//! # Architecture Overview
//!
//! ```text
//!   Webhook sender                 RELAY SERVER                       relay-cli
//!   ──────────────┐   ┌───────────────────────────────────┐   ┌───────────────────────┐
//!   POST          │   │ http::dispatch                    │   │ client::session       │
//!   abc.domain/x ─┼──▶│   Host label → session::Registry ─┼ws─▶│   → client::replay    │──▶ localhost:<port>
//!                 │   │   codec::wire encode → broadcast  │   │   codec decode, print │
//!                 │   │                                   │   └───────────────────────┘
//!                 │   │ http::upgrade (/connect,          │
//!                 │   │   /connect-group) → Registry      │
//!                 │   │   → session::Supervisor (ping,    │
//!                 │   │     deadline, reap)               │
//!                 │   └───────────────────────────────────┘
//! ```

// Core subsystems
pub mod codec;
pub mod http;
pub mod identity;
pub mod session;

// Client side
pub mod client;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
