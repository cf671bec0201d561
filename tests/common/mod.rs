//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use webhook_relay::config::RelayConfig;
use webhook_relay::http::HttpServer;
use webhook_relay::lifecycle::Shutdown;
use webhook_relay::session::Registry;

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A relay server running on an ephemeral port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    pub shutdown: Shutdown,
}

impl TestRelay {
    pub fn ws_base(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Host header addressing the group `key`.
    pub fn host_for(&self, key: &str) -> String {
        format!("{}.localhost:{}", key, self.addr.port())
    }

    pub async fn send(&self, method: reqwest::Method, host: &str, path: &str, body: &'static str) -> reqwest::Response {
        http_client()
            .request(method, format!("http://{}{}", self.addr, path))
            .header(reqwest::header::HOST, host)
            .body(body)
            .send()
            .await
            .expect("relay unreachable")
    }

    /// Wait until the group `key` is gone from the registry.
    pub async fn wait_for_group_removal(&self, key: &str, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            if self.registry.lookup(key).is_none() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

/// Start a relay with the given read deadline.
pub async fn start_relay(read_deadline_ms: u64) -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = RelayConfig::default();
    config.listener.bind_address = addr.to_string();
    config.identity.domain = format!("localhost:{}", addr.port());
    config.liveness.read_deadline_ms = read_deadline_ms;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone());
    let registry = server.registry();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    TestRelay {
        addr,
        registry,
        shutdown,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Open a raw WebSocket to `path` on the relay.
pub async fn dial(relay: &TestRelay, path: &str) -> Socket {
    let (socket, _) = connect_async(format!("{}{}", relay.ws_base(), path))
        .await
        .expect("websocket handshake failed");
    socket
}

/// Next data frame, skipping control frames.
pub async fn next_data(socket: &mut Socket) -> Option<Message> {
    let read = async {
        while let Some(frame) = socket.next().await {
            match frame {
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Ok(message) => return Some(message),
                Err(_) => return None,
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("timed out waiting for a frame")
}

/// A request observed by a mock local service.
#[derive(Debug)]
pub struct Recorded {
    pub method: String,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Start a mock local service that records every request it receives.
pub async fn start_local_service() -> (u16, mpsc::UnboundedReceiver<Recorded>) {
    async fn record(
        State(tx): State<mpsc::UnboundedSender<Recorded>>,
        request: Request<Body>,
    ) -> StatusCode {
        let (parts, body) = request.into_parts();
        let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
        let _ = tx.send(Recorded {
            method: parts.method.to_string(),
            path_and_query: parts
                .uri
                .path_and_query()
                .map(|pq| pq.to_string())
                .unwrap_or_default(),
            headers: parts.headers,
            body,
        });
        StatusCode::NO_CONTENT
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().fallback(record).with_state(tx);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (port, rx)
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
