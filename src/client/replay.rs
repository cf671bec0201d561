//! Local replay of relayed requests.
//!
//! # Responsibilities
//! - Decode binary frames into forwarded requests
//! - Print the selected fields
//! - Re-issue each request against every configured local port, in order
//!
//! # Design Decisions
//! - A failing target is logged and reported; it never stops the others
//! - Hop-by-hop headers and `Host`/`Content-Length` are recomputed by the client

use std::io::Write;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

use crate::client::fields::{self, RequestField};
use crate::client::ClientError;
use crate::codec::{self, ForwardedRequest};

/// Headers that describe one hop and are not replayed.
const SKIPPED_HEADERS: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Result of replaying one request against one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub port: u16,
    /// Local status code, or why the request could not be delivered.
    pub result: Result<u16, String>,
}

/// Decodes relayed frames and replays them locally.
pub struct ReplayEngine {
    http: reqwest::Client,
    host: String,
    ports: Vec<u16>,
    fields: Vec<RequestField>,
}

impl ReplayEngine {
    pub fn new(ports: Vec<u16>, fields: Vec<RequestField>) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: "localhost".to_string(),
            ports,
            fields,
        }
    }

    /// Replay against `host` instead of `localhost`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Handle one frame from the relay.
    ///
    /// Text frames are printed as-is. Binary frames are decoded, printed and
    /// replayed; a frame that fails to decode is dropped with a warning.
    pub async fn handle<W: Write + Send>(
        &self,
        message: Message,
        out: &mut W,
    ) -> Result<Vec<ReplayOutcome>, ClientError> {
        match message {
            Message::Text(text) => {
                write!(out, "\n{}", text.as_str())?;
                out.flush()?;
                Ok(Vec::new())
            }
            Message::Binary(frame) => {
                let request = match codec::decode(&frame) {
                    Ok(request) => request,
                    Err(e) => {
                        tracing::warn!(error = %e, bytes = frame.len(), "Dropping undecodable frame");
                        return Ok(Vec::new());
                    }
                };
                write!(out, "{}", fields::render(&self.fields, &request))?;
                out.flush()?;
                Ok(self.replay(&request).await)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Re-issue `request` against every configured port, one after another.
    pub async fn replay(&self, request: &ForwardedRequest) -> Vec<ReplayOutcome> {
        let mut outcomes = Vec::with_capacity(self.ports.len());
        for &port in &self.ports {
            let result = self.forward(request, port).await;
            match &result {
                Ok(status) => {
                    tracing::debug!(port, status, path = %request.url.path, "Replayed request");
                }
                Err(e) => {
                    tracing::warn!(port, error = %e, "Could not forward request to local server");
                }
            }
            outcomes.push(ReplayOutcome { port, result });
        }
        outcomes
    }

    async fn forward(&self, request: &ForwardedRequest, port: u16) -> Result<u16, String> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| format!("invalid method '{}': {}", request.method, e))?;
        let target = self.target(request, port);

        let response = self
            .http
            .request(method, &target)
            .headers(replay_headers(request))
            .body(Bytes::clone(&request.body))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        Ok(response.status().as_u16())
    }

    fn target(&self, request: &ForwardedRequest, port: u16) -> String {
        format!("http://{}:{}{}", self.host, port, request.url.path_and_query())
    }
}

fn replay_headers(request: &ForwardedRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, values) in &request.headers {
        let lower = name.to_ascii_lowercase();
        if SKIPPED_HEADERS.contains(&lower.as_str()) || lower == "content-length" {
            continue;
        }
        let Ok(name) = HeaderName::from_bytes(lower.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(name.clone(), value);
            }
        }
    }
    headers
}
