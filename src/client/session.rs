//! Relay connection from the client side.

use std::io::Write;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};

use crate::client::{ClientError, ReplayEngine};

/// How long the server has to greet a new member.
pub const GREETING_TIMEOUT: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A member connection to the relay server.
pub struct RelayClient {
    /// Public URL of the group.
    pub url: String,
    /// Group password.
    pub key: String,
    socket: Socket,
}

impl RelayClient {
    /// Start a new group at `server` and read its greeting.
    pub async fn open(server: &str) -> Result<Self, ClientError> {
        let endpoint = endpoint(server, "connect");
        let request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|_| ClientError::InvalidServer(server.to_string()))?;
        let mut socket = dial(&endpoint, request).await?;

        let greeting = match tokio::time::timeout(GREETING_TIMEOUT, socket.next()).await {
            Err(_) => return Err(ClientError::GreetingTimeout(GREETING_TIMEOUT)),
            Ok(None) => return Err(ClientError::ConnectionLost("closed before greeting".into())),
            Ok(Some(Err(e))) => return Err(ClientError::ConnectionLost(e.to_string())),
            Ok(Some(Ok(Message::Text(text)))) => text,
            Ok(Some(Ok(other))) => {
                return Err(ClientError::BadGreeting(format!("expected text, got {other:?}")))
            }
        };

        let (url, key) = parse_greeting(greeting.as_str())?;
        tracing::debug!(url = %url, "Session opened");
        Ok(Self { url, key, socket })
    }

    /// Join the existing group named by `url`.
    ///
    /// The server does not acknowledge a join. A refused join shows up as a
    /// diagnostic text frame followed by a close on the stream.
    pub async fn join(server: &str, url: &str, key: &str) -> Result<Self, ClientError> {
        let endpoint = endpoint(server, "connect-group");
        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|_| ClientError::InvalidServer(server.to_string()))?;
        let headers = request.headers_mut();
        for (name, value) in [("url", url), ("key", key)] {
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::BadCredentials(name.to_string()))?;
            headers.insert(name, value);
        }

        let socket = dial(&endpoint, request).await?;
        Ok(Self {
            url: url.to_string(),
            key: key.to_string(),
            socket,
        })
    }

    /// Handle frames until the connection ends.
    ///
    /// A close from the server ends the stream cleanly; a transport error is
    /// `ClientError::ConnectionLost`.
    pub async fn stream<W: Write + Send>(
        mut self,
        engine: &ReplayEngine,
        out: &mut W,
    ) -> Result<(), ClientError> {
        while let Some(frame) = self.socket.next().await {
            let message = frame.map_err(|e| ClientError::ConnectionLost(e.to_string()))?;
            if let Message::Close(reason) = &message {
                tracing::info!(reason = ?reason, "Relay closed the connection");
                return Ok(());
            }
            engine.handle(message, out).await?;
        }
        Ok(())
    }
}

/// Split a greeting into the group URL and password.
pub fn parse_greeting(greeting: &str) -> Result<(String, String), ClientError> {
    let (url, rest) = greeting
        .split_once('\n')
        .ok_or_else(|| ClientError::BadGreeting(greeting.to_string()))?;
    let key = rest
        .strip_prefix("password: ")
        .ok_or_else(|| ClientError::BadGreeting(greeting.to_string()))?;

    let url = url.trim();
    let key = key.trim();
    if url.is_empty() || key.is_empty() {
        return Err(ClientError::BadGreeting(greeting.to_string()));
    }
    Ok((url.to_string(), key.to_string()))
}

fn endpoint(server: &str, path: &str) -> String {
    format!("{}/{}", server.trim_end_matches('/'), path)
}

async fn dial(
    endpoint: &str,
    request: tokio_tungstenite::tungstenite::handshake::client::Request,
) -> Result<Socket, ClientError> {
    let (socket, _) = connect_async(request)
        .await
        .map_err(|e| ClientError::Connect {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
    Ok(socket)
}
