//! Forwarded request codec.
//!
//! # Data Flow
//! ```text
//! Server:
//!     inbound POST (axum Request<Body>)
//!     → request.rs (buffer body once, materialize form fields, snapshot)
//!     → wire.rs encode (fixed field order, version tag)
//!     → binary WebSocket frame to every group member
//!
//! Client:
//!     binary WebSocket frame
//!     → wire.rs decode
//!     → ForwardedRequest (body is an in-memory buffer)
//!     → replay against local targets
//! ```
//!
//! # Wire Layout
//! One version byte, then in order: method, url, protocol version, headers,
//! body, content length, transfer encoding, host, form, post form, trailer,
//! remote address, request URI. Strings and blobs are `u32` big-endian length
//! prefixed; lists and multimaps are `u32` count prefixed.
//!
//! # Design Decisions
//! - Decoding is strict: truncation and trailing bytes are errors
//! - A decode error drops one message, never the connection

pub mod request;
pub mod wire;

use thiserror::Error;

pub use request::{ForwardedRequest, ForwardedUrl, Multimap};
pub use wire::{decode, encode, WIRE_VERSION};

/// Errors produced while capturing, encoding or decoding a forwarded request.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The buffer ended before the named field was complete.
    #[error("truncated message while reading {field}")]
    Truncated { field: &'static str },

    /// Bytes remained after the last field.
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),

    /// The leading version tag is not one this build understands.
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    /// The request body exceeded the configured limit.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The request body stream failed.
    #[error("failed to read request body: {0}")]
    BodyRead(String),
}
