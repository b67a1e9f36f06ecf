//! In-memory connector for driving the connection manager in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use events::{Handshake, Packet, decode_packet, encode_packet};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::transport::{CloseReason, Connector, Link, LinkEvent, TransportError};

pub struct MemoryConnector {
    opens: AtomicUsize,
    refusing: AtomicBool,
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

impl MemoryConnector {
    /// Connector plus the stream of server ends, one per successful open.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            opens: AtomicUsize::new(0),
            refusing: AtomicBool::new(false),
            accepted,
        });
        (connector, rx)
    }

    /// Open attempts so far, refused ones included.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, _url: &str) -> Result<Link, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::Refused("memory connector is refusing".to_owned()));
        }
        let (outgoing, from_client) = mpsc::unbounded_channel();
        let (to_client, incoming) = mpsc::unbounded_channel();
        let _ = self.accepted.send(ServerEnd {
            from_client,
            to_client,
        });
        Ok(Link::new(outgoing, incoming, None, None))
    }
}

/// The server's side of one in-memory link.
pub struct ServerEnd {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<LinkEvent>,
}

impl ServerEnd {
    pub fn send(&self, packet: &Packet) {
        let _ = self.to_client.send(LinkEvent::Text(encode_packet(packet)));
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.to_client.send(LinkEvent::Text(text.to_owned()));
    }

    pub fn emit(&self, name: &str, data: Value) {
        self.send(&Packet::Event {
            name: name.to_owned(),
            data,
        });
    }

    /// Engine.IO open packet.
    pub fn open(&self) {
        self.send(&Packet::Open(Handshake {
            sid: "eio-memory".to_owned(),
            upgrades: Vec::new(),
            ping_interval: 25_000,
            ping_timeout: 20_000,
            max_payload: None,
        }));
    }

    /// Socket.IO connect acknowledgement.
    pub fn ack(&self, socket_id: &str) {
        self.send(&Packet::Connect(Some(json!({ "sid": socket_id }))));
    }

    /// Full open plus connect exchange. Returns the client's connect payload.
    pub async fn handshake(&mut self, socket_id: &str) -> Option<Value> {
        self.open();
        let connect = self.next_packet().await;
        let Some(Packet::Connect(auth)) = connect else {
            panic!("expected socket.io connect, got {connect:?}");
        };
        self.ack(socket_id);
        auth
    }

    pub fn close(&self, reason: CloseReason) {
        let _ = self.to_client.send(LinkEvent::Closed(reason));
    }

    /// Next frame from the client, decoded. `None` once the client dropped the link.
    pub async fn next_packet(&mut self) -> Option<Packet> {
        let text = self.from_client.recv().await?;
        Some(decode_packet(&text).unwrap_or_else(|error| panic!("client sent `{text}`: {error}")))
    }

    /// Next named event from the client, skipping control packets.
    pub async fn next_event(&mut self) -> Option<(String, Value)> {
        loop {
            if let Packet::Event { name, data } = self.next_packet().await? {
                return Some((name, data));
            }
        }
    }

    /// A frame already queued by the client, if any.
    pub fn try_next_packet(&mut self) -> Option<Packet> {
        let text = self.from_client.try_recv().ok()?;
        decode_packet(&text).ok()
    }
}
