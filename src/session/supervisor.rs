//! Per-member liveness supervision.
//!
//! # Responsibilities
//! - Ping the member on a fixed interval
//! - Extend the read deadline on every pong
//! - Detect death (deadline, read error, close, shutdown) and reap the member
//!
//! # State Machine
//! ```text
//! Active ──(pong)──▶ Active (deadline = now + window)
//! Active ──(deadline | read error | close | ping failure | shutdown)──▶ Dead
//! Dead: remove from registry, close link, return cause
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures_util::{Stream, StreamExt};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::lifecycle::ShutdownListener;
use crate::observability::metrics;
use crate::session::{MemberHandle, MemberLink, Registry, Session};

/// Why a member was reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    /// No pong within one read-deadline window.
    DeadlineElapsed,
    /// Close frame received or the stream ended.
    PeerClosed,
    /// Reading from the connection failed.
    ReadFailed,
    /// A heartbeat could not be written.
    HeartbeatFailed,
    /// The server is shutting down.
    Shutdown,
}

impl DeathCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeathCause::DeadlineElapsed => "deadline_elapsed",
            DeathCause::PeerClosed => "peer_closed",
            DeathCause::ReadFailed => "read_failed",
            DeathCause::HeartbeatFailed => "heartbeat_failed",
            DeathCause::Shutdown => "shutdown",
        }
    }
}

/// Heartbeat period for a read-deadline window: nine tenths of it.
pub fn heartbeat_interval(window: Duration) -> Duration {
    window * 9 / 10
}

/// Liveness supervisor for one member.
pub struct Supervisor {
    registry: Arc<Registry>,
    key: String,
    handle: MemberHandle,
    link: Arc<MemberLink>,
    window: Duration,
    shutdown: ShutdownListener,
}

impl Supervisor {
    pub fn new(
        registry: Arc<Registry>,
        session: &Session,
        link: Arc<MemberLink>,
        window: Duration,
        shutdown: ShutdownListener,
    ) -> Self {
        Self {
            registry,
            key: session.key.clone(),
            handle: session.handle,
            link,
            window,
            shutdown,
        }
    }

    /// Drive the member until it dies, then reap it.
    ///
    /// `inbound` is the read half of the member connection. Only pongs extend
    /// the deadline; other frames from the member are ignored.
    pub async fn run<S>(mut self, mut inbound: S) -> DeathCause
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let mut heartbeat = time::interval(heartbeat_interval(self.window));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = time::sleep(self.window);
        tokio::pin!(deadline);

        let cause = loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let ping = self.link.send(Message::Ping(Bytes::new()));
                    match time::timeout(self.window, ping).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::debug!(key = %self.key, member = %self.handle, error = %e, "Heartbeat failed");
                            break DeathCause::HeartbeatFailed;
                        }
                        Err(_) => break DeathCause::HeartbeatFailed,
                    }
                }
                () = &mut deadline => break DeathCause::DeadlineElapsed,
                frame = inbound.next() => match frame {
                    Some(Ok(Message::Pong(_))) => {
                        deadline.as_mut().reset(Instant::now() + self.window);
                    }
                    Some(Ok(Message::Close(_))) | None => break DeathCause::PeerClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(key = %self.key, member = %self.handle, error = %e, "Member read failed");
                        break DeathCause::ReadFailed;
                    }
                },
                () = self.shutdown.recv() => break DeathCause::Shutdown,
            }
        };

        self.registry.remove_member(&self.key, self.handle);
        self.link.close().await;

        tracing::info!(key = %self.key, member = %self.handle, cause = cause.as_str(), "Member reaped");
        metrics::record_member_removed(cause.as_str());
        cause
    }
}
