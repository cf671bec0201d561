//! Write half of a member connection.

use std::pin::Pin;
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use tokio::sync::{watch, Mutex};

use crate::session::SessionError;

type BoxSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// Upper bound on writing the close frame to a peer that may not be reading.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Serializes writes to one member connection.
///
/// Heartbeats from the supervisor and broadcasts from request handlers run on
/// different tasks; both go through this lock. Closing the link first cancels
/// every pending or in-flight send, so a peer that stopped reading cannot keep
/// the lock from the closer.
pub struct MemberLink {
    sink: Mutex<BoxSink>,
    closed: watch::Sender<bool>,
}

impl MemberLink {
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
    {
        Self {
            sink: Mutex::new(Box::pin(sink)),
            closed: watch::Sender::new(false),
        }
    }

    /// Send one frame and flush it.
    ///
    /// Fails with `SessionError::Transport` once the link is closed, including
    /// when the close happens while this send is waiting.
    pub async fn send(&self, message: Message) -> Result<(), SessionError> {
        let mut closed = self.closed.subscribe();
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(message)
                .await
                .map_err(|e| SessionError::Transport(e.to_string()))
        };

        tokio::select! {
            biased;
            () = wait_closed(&mut closed) => Err(link_closed()),
            result = write => result,
        }
    }

    /// Cancel pending sends, then send a close frame and shut the sink.
    ///
    /// The close frame is best effort and bounded by [`CLOSE_TIMEOUT`].
    pub async fn close(&self) {
        self.closed.send_replace(true);

        let shutdown = async {
            let mut sink = self.sink.lock().await;
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
            tracing::debug!("Peer did not accept close frame in time");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn link_closed() -> SessionError {
    SessionError::Transport("link closed".to_string())
}

impl std::fmt::Debug for MemberLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberLink").finish_non_exhaustive()
    }
}

/// A link whose frames land in a channel, for exercising sessions without sockets.
#[cfg(test)]
pub(crate) fn channel_link() -> (
    std::sync::Arc<MemberLink>,
    tokio::sync::mpsc::UnboundedReceiver<Message>,
) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = futures_util::sink::unfold(
        tx,
        |tx: tokio::sync::mpsc::UnboundedSender<Message>, message: Message| async move {
            tx.send(message).map_err(axum::Error::new)?;
            Ok::<_, axum::Error>(tx)
        },
    );
    (std::sync::Arc::new(MemberLink::new(sink)), rx)
}

/// Sink whose peer never accepts another byte.
#[cfg(test)]
pub(crate) struct Stalled;

#[cfg(test)]
impl Sink<Message> for Stalled {
    type Error = axum::Error;

    fn poll_ready(
        self: Pin<&mut Self>,
        _: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Pending
    }

    fn start_send(self: Pin<&mut Self>, _: Message) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Pending
    }

    fn poll_close(
        self: Pin<&mut Self>,
        _: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Pending
    }
}

/// A link to a member that has stopped reading.
#[cfg(test)]
pub(crate) fn stalled_link() -> std::sync::Arc<MemberLink> {
    std::sync::Arc::new(MemberLink::new(Stalled))
}
