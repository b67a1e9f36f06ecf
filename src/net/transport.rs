//! WebSocket link to the tracking server.
//!
//! DESIGN
//! ======
//! A [`Link`] is one open WebSocket carrying Engine.IO text frames. The
//! socket is split into a writer task and a reader task joined to the owner
//! by unbounded channels, so the connection driver never awaits socket I/O
//! inside its select loop. Dropping a link aborts both tasks.
//!
//! ERROR HANDLING
//! ==============
//! Failures while opening surface as [`TransportError`]. Once open, every
//! way the socket can end is reported in-band as [`LinkEvent::Closed`] with a
//! [`CloseReason`]; the link itself never returns errors.

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("timed out opening the connection")]
    Timeout,
    #[error("server rejected the connection: {0}")]
    Rejected(String),
    #[error("connection closed during handshake")]
    ClosedDuringHandshake,
}

/// Why an open link ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// This client asked for the close.
    Local,
    /// The server closed the socket or the Socket.IO namespace.
    Server,
    Network(String),
    /// Too many consecutive heartbeats went unanswered.
    HeartbeatLost,
}

impl CloseReason {
    /// Whether the manager should try to get the session back.
    #[must_use]
    pub fn reconnects(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("closed by client"),
            Self::Server => f.write_str("closed by server"),
            Self::Network(detail) => write!(f, "network error: {detail}"),
            Self::HeartbeatLost => f.write_str("heartbeat lost"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    Text(String),
    Closed(CloseReason),
}

// =============================================================================
// LINK
// =============================================================================

pub struct Link {
    outgoing: Option<mpsc::UnboundedSender<String>>,
    incoming: mpsc::UnboundedReceiver<LinkEvent>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl Link {
    /// Assemble a link from its channel ends and the tasks that service them.
    #[must_use]
    pub fn new(
        outgoing: mpsc::UnboundedSender<String>,
        incoming: mpsc::UnboundedReceiver<LinkEvent>,
        writer: Option<JoinHandle<()>>,
        reader: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outgoing: Some(outgoing),
            incoming,
            writer,
            reader,
        }
    }

    /// Queue a text frame. Returns false once the writer is gone.
    pub fn send(&self, text: String) -> bool {
        self.outgoing
            .as_ref()
            .is_some_and(|outgoing| outgoing.send(text).is_ok())
    }

    /// Next event from the reader. `None` means the reader vanished without a reason.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.incoming.recv().await
    }

    /// Flush queued frames, send a close frame, and stop both tasks.
    ///
    /// Waits at most `grace` for the writer to drain.
    pub async fn close(&mut self, grace: Duration) {
        self.outgoing = None;
        if let Some(mut writer) = self.writer.take() {
            if tokio::time::timeout(grace, &mut writer).await.is_err() {
                debug!("websocket writer did not drain within grace period");
                writer.abort();
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.incoming.close();
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

// =============================================================================
// CONNECTORS
// =============================================================================

/// Opens links. Swapped for an in-memory pair in tests.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a WebSocket to `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the socket cannot be established.
    async fn open(&self, url: &str) -> Result<Link, TransportError>;
}

/// Real WebSocket connector over tokio-tungstenite.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Link, TransportError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|error| TransportError::Connect(Box::new(error)))?;
        let (mut sink, mut source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (incoming_tx, incoming) = mpsc::unbounded_channel::<LinkEvent>();

        let writer = tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(error) = sink.send(Message::Text(text.into())).await {
                    debug!(%error, "websocket write failed");
                    return;
                }
            }
            if let Err(error) = sink.close().await {
                debug!(%error, "websocket close failed");
            }
        });

        let reader = tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if incoming_tx.send(LinkEvent::Text(text.as_str().to_owned())).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "websocket closed by peer");
                        break CloseReason::Server;
                    }
                    // Control frames are answered by tungstenite; binary frames are not part of this protocol.
                    Some(Ok(_)) => {}
                    Some(Err(error)) => break CloseReason::Network(error.to_string()),
                    None => break CloseReason::Network("stream ended".to_owned()),
                }
            };
            let _ = incoming_tx.send(LinkEvent::Closed(reason));
        });

        Ok(Link::new(outgoing, incoming, Some(writer), Some(reader)))
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
