//! Inbound webhook dispatch.
//!
//! # Responsibilities
//! - Resolve the group from the leftmost Host label
//! - Relay POST requests to every member of the group
//! - Refuse everything else
//!
//! # Outcomes
//! ```text
//! no live group for the label → 404 "connection closed"
//! group, POST                 → capture, encode, broadcast → 202
//! group, POST over body limit → 413
//! group, any other method     → 403
//! ```

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ws::Message, ConnectInfo, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::codec::{self, CodecError, ForwardedRequest};
use crate::http::{request::SenderRequestId, request_id, AppState, X_REQUEST_ID};
use crate::identity;
use crate::observability::metrics;

/// Fallback handler for every path that is not a session endpoint.
pub async fn relay(State(state): State<AppState>, request: Request<Body>) -> Response {
    relay_request(&state, request).await
}

/// Relay one inbound request to the group its Host names.
pub async fn relay_request(state: &AppState, request: Request<Body>) -> Response {
    let request_id = request_id(request.headers());
    let method = request.method().clone();

    let key = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .and_then(identity::host_label);

    let members = key
        .as_deref()
        .and_then(|key| state.registry.lookup(key));
    let key = match (key, members) {
        (Some(key), Some(_)) => key,
        (key, _) => {
            tracing::debug!(request_id = %request_id, key = ?key, "No live group for host");
            return respond(&method, StatusCode::NOT_FOUND, "connection closed");
        }
    };

    if method != Method::POST {
        tracing::debug!(request_id = %request_id, key = %key, method = %method, "Refusing non-POST request");
        return respond(&method, StatusCode::FORBIDDEN, "only POST requests are relayed");
    }

    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let sender_request_id = SenderRequestId::of(&request);

    let mut snapshot = match ForwardedRequest::capture(request, remote_addr, state.limits.max_body_size).await {
        Ok((snapshot, _)) => snapshot,
        Err(e @ CodecError::BodyTooLarge { .. }) => {
            tracing::warn!(request_id = %request_id, key = %key, error = %e, "Rejecting oversized webhook");
            return respond(&method, StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, key = %key, error = %e, "Failed to read webhook");
            return respond(&method, StatusCode::BAD_REQUEST, "failed to read request");
        }
    };

    if !sender_request_id {
        snapshot.headers.remove(X_REQUEST_ID);
    }

    let payload = codec::encode(&snapshot);
    let size = payload.len();
    let (members, delivered) = match state.registry.group_handler(&key) {
        Some(group) if !group.is_empty() => {
            (group.len(), group.broadcast(Message::Binary(payload)).await)
        }
        _ => (0, 0),
    };

    tracing::info!(
        request_id = %request_id,
        key = %key,
        path = %snapshot.url.path,
        bytes = size,
        members,
        delivered,
        "Relayed webhook"
    );
    respond(&method, StatusCode::ACCEPTED, "")
}

fn respond(method: &Method, status: StatusCode, body: &'static str) -> Response {
    metrics::record_request(method.as_str(), status.as_u16());
    (status, body).into_response()
}
