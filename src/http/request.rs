//! Request identification.
//!
//! # Responsibilities
//! - Name the request ID header set by the server's request-id layers
//! - Read it back for log correlation
//! - Remember whether the sender supplied the ID itself
//!
//! # Design Decisions
//! - IDs are UUID v4, assigned as early as possible and echoed on the response
//! - A generated ID is for the relay's logs only and is not forwarded

use axum::{body::Body, http::HeaderMap, http::Request};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request's correlation ID, or `"unknown"` when the layer did not run.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Whether the inbound request carried `x-request-id` before the relay
/// assigned one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderRequestId(pub bool);

impl SenderRequestId {
    /// Reads the marker left by [`mark_sender_request_id`]. Absent means the
    /// middleware did not run, so the header is the sender's.
    pub fn of<B>(request: &Request<B>) -> bool {
        request
            .extensions()
            .get::<SenderRequestId>()
            .map_or(true, |marker| marker.0)
    }
}

/// Middleware run ahead of the request-id layer.
pub async fn mark_sender_request_id(mut request: Request<Body>) -> Request<Body> {
    let supplied = request.headers().contains_key(X_REQUEST_ID);
    request.extensions_mut().insert(SenderRequestId(supplied));
    request
}
