//! Session management subsystem.
//!
//! # Data Flow
//! ```text
//! /connect upgrade
//!     → registry.rs create_session (new label, password, first member)
//!     → supervisor.rs (heartbeat + read loop for that member)
//!
//! /connect-group upgrade
//!     → registry.rs join_session (label + password check)
//!     → supervisor.rs
//!
//! Inbound webhook
//!     → registry.rs group_handler / broadcast
//!     → link.rs (per-member write lock) → WebSocket
//!
//! Member death (deadline, read error, close, shutdown)
//!     → supervisor.rs → registry.rs remove_member
//!     → group and password dropped with the last member
//! ```
//!
//! # Design Decisions
//! - The registry is an explicitly constructed value shared via Arc
//! - Group entries own their password, so both vanish in one map operation
//! - Broadcast never removes members; only the supervisor does
//! - Each member's writes go through its own lock, separate from the map lock

pub mod link;
pub mod registry;
pub mod supervisor;

use thiserror::Error;

pub use link::MemberLink;
pub use registry::{GroupHandler, MemberHandle, Registry, Session};
pub use supervisor::{heartbeat_interval, DeathCause, Supervisor};

/// Errors surfaced by session operations.
///
/// The display strings are sent verbatim to joining clients as diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No group exists for the presented identity.
    #[error("invalid group")]
    InvalidGroup,

    /// The group exists but the password does not match.
    #[error("wrong password")]
    WrongPassword,

    /// Writing to the member connection failed.
    #[error("transport error: {0}")]
    Transport(String),
}
