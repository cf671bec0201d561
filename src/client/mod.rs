//! Client side of the relay.
//!
//! # Data Flow
//! ```text
//! relay server ──ws──▶ session.rs (RelayClient)
//!     text frame   → printed
//!     binary frame → replay.rs: decode → fields.rs print → replay to each port
//! ```

pub mod fields;
pub mod replay;
pub mod session;

use std::time::Duration;

use thiserror::Error;

pub use fields::RequestField;
pub use replay::{ReplayEngine, ReplayOutcome};
pub use session::{parse_greeting, RelayClient, GREETING_TIMEOUT};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server address '{0}'")]
    InvalidServer(String),

    #[error("{0} is not a valid header value")]
    BadCredentials(String),

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("server did not greet within {0:?}")]
    GreetingTimeout(Duration),

    #[error("unexpected greeting: {0:?}")]
    BadGreeting(String),

    #[error("connection to relay lost: {0}")]
    ConnectionLost(String),

    #[error("unknown field '{name}', available fields: {available}")]
    UnknownField { name: String, available: String },

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
