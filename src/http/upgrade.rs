//! Session endpoints.
//!
//! `/connect` starts a fresh group and greets the member with its identity
//! URL and password. `/connect-group` joins an existing group named by the
//! `url` and `key` headers. Both hand the connection to a liveness
//! supervisor for the rest of its life.
//!
//! A plain (non-upgrade) request on either path is an ordinary webhook and
//! goes through the relay dispatcher.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, Request},
    response::Response,
};
use futures_util::stream::{SplitStream, StreamExt};

use crate::http::{dispatch, AppState};
use crate::session::{MemberLink, Session, Supervisor};

/// Header naming the group to join.
pub const URL_HEADER: &str = "url";
/// Header carrying the group password.
pub const KEY_HEADER: &str = "key";

/// Greeting sent to the first member of a new group.
pub fn greeting(session: &Session) -> String {
    format!("{}\npassword: {}", session.url, session.password)
}

pub async fn connect(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request<Body>,
) -> Response {
    match upgrade {
        Ok(ws) => ws.on_upgrade(move |socket| start_group(state, socket)),
        Err(_) => dispatch::relay_request(&state, request).await,
    }
}

pub async fn connect_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request<Body>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(_) => return dispatch::relay_request(&state, request).await,
    };
    let url = header_value(&headers, URL_HEADER);
    let key = header_value(&headers, KEY_HEADER);
    ws.on_upgrade(move |socket| join_group(state, url, key, socket))
}

async fn start_group(state: AppState, socket: WebSocket) {
    let (sink, stream) = socket.split();
    let link = Arc::new(MemberLink::new(sink));
    let session = state.registry.create_session(link.clone());

    if let Err(e) = link.send(Message::Text(greeting(&session).into())).await {
        tracing::warn!(key = %session.key, error = %e, "Failed to greet member");
        state.registry.remove_member(&session.key, session.handle);
        link.close().await;
        return;
    }

    supervise(state, session, link, stream).await;
}

async fn join_group(state: AppState, url: String, key: String, socket: WebSocket) {
    let (sink, stream) = socket.split();
    let link = Arc::new(MemberLink::new(sink));

    match state.registry.join_session(&url, &key, link.clone()) {
        Ok(session) => supervise(state, session, link, stream).await,
        Err(e) => {
            tracing::info!(url = %url, error = %e, "Join refused");
            let _ = link.send(Message::Text(e.to_string().into())).await;
            link.close().await;
        }
    }
}

async fn supervise(
    state: AppState,
    session: Session,
    link: Arc<MemberLink>,
    stream: SplitStream<WebSocket>,
) {
    let supervisor = Supervisor::new(
        state.registry.clone(),
        &session,
        link,
        state.liveness.window(),
        state.shutdown.subscribe(),
    );
    supervisor.run(stream).await;
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemberHandle;

    #[test]
    fn greeting_carries_url_and_password() {
        let session = Session {
            key: "q1w2e3r4".into(),
            url: "http://q1w2e3r4.relay.dev".into(),
            password: "Ab3dE9".into(),
            handle: MemberHandle::new(),
        };
        assert_eq!(greeting(&session), "http://q1w2e3r4.relay.dev\npassword: Ab3dE9");
    }

    #[test]
    fn missing_headers_read_as_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(URL_HEADER, " http://abc.relay.dev ".parse().unwrap());
        assert_eq!(header_value(&headers, URL_HEADER), "http://abc.relay.dev");
        assert_eq!(header_value(&headers, KEY_HEADER), "");
    }
}
