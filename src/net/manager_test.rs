use super::*;
use crate::net::memory::{MemoryConnector, ServerEnd};
use events::{LatLng, UserCount};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;

// =============================================================================
// HARNESS
// =============================================================================

fn config() -> ConnectionConfig {
    let mut config = ConnectionConfig::new("ws://tracker.test/socket.io/?EIO=4&transport=websocket");
    config.auth_token = Some("secret".to_owned());
    config
}

struct Harness {
    manager: ConnectionManager,
    connector: Arc<MemoryConnector>,
    accepted: mpsc::UnboundedReceiver<ServerEnd>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

fn harness_with(config: ConnectionConfig, identity: Identity) -> Harness {
    let (connector, accepted) = MemoryConnector::new();
    let dyn_connector: Arc<dyn Connector> = connector.clone();
    let manager = ConnectionManager::new(config, identity, dyn_connector);
    let events = manager.subscribe();
    Harness {
        manager,
        connector,
        accepted,
        events,
    }
}

fn harness() -> Harness {
    harness_with(config(), Identity::new("Ann", Role::Worker))
}

impl Harness {
    async fn accept(&mut self) -> ServerEnd {
        self.accepted.recv().await.expect("server end")
    }

    /// Connect, complete the handshake, and consume the join announcement.
    async fn online(&mut self) -> ServerEnd {
        self.manager.connect().unwrap();
        let mut server = self.accept().await;
        server.handshake("sock-1").await;
        let (name, _) = server.next_event().await.unwrap();
        assert_eq!(name, "join-tracking");
        server
    }

    async fn next_status(&mut self) -> (ConnectionStatus, u64) {
        loop {
            if let ClientEvent::Status { status, epoch } = self.events.recv().await.unwrap() {
                return (status, epoch);
            }
        }
    }

    async fn wait_for_status(&mut self, wanted: ConnectionStatus) -> u64 {
        loop {
            let (status, epoch) = self.next_status().await;
            if status == wanted {
                return epoch;
            }
        }
    }
}

fn report(latitude: f64, longitude: f64) -> LocationReport {
    LocationReport {
        location: LatLng::new(latitude, longitude),
        accuracy: Some(8.0),
        speed: None,
        heading: None,
        timestamp: 1,
    }
}

// =============================================================================
// CONNECT AND JOIN
// =============================================================================

#[tokio::test(start_paused = true)]
async fn handshake_connects_and_joins_once_per_connected_period() {
    let identity = Identity::new("Ann", Role::Supervisor);
    let mut h = harness_with(config(), identity.clone());
    h.manager.send_location(report(40.0, -105.0)).unwrap();
    h.manager.connect().unwrap();

    let mut server = h.accept().await;
    let auth = server.handshake("sock-1").await;
    assert_eq!(auth, Some(json!({ "token": "secret" })));
    server.ack("sock-1");

    let start = Instant::now();
    let (name, data) = server.next_event().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(250));
    assert_eq!(name, "join-tracking");
    assert_eq!(data["name"], "Ann");
    assert_eq!(data["role"], "supervisor");
    assert_eq!(data["sessionId"], identity.session_id);
    assert_eq!(data["location"], json!({ "latitude": 40.0, "longitude": -105.0 }));
    assert_eq!(data["accuracy"], 8.0);
    assert!(data.get("speed").is_none());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(server.try_next_packet().is_none());

    let session = h.manager.session();
    assert_eq!(session.status, ConnectionStatus::Connected);
    assert_eq!(session.socket_id.as_deref(), Some("sock-1"));
    assert_eq!(session.reconnect_attempts, 0);
    assert_eq!(session.epoch, 1);

    assert_eq!(h.next_status().await, (ConnectionStatus::Connecting, 1));
    assert_eq!(h.next_status().await, (ConnectionStatus::Connected, 1));
}

#[tokio::test(start_paused = true)]
async fn connect_while_connected_is_ignored() {
    let mut h = harness();
    let _server = h.online().await;
    h.manager.connect().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(h.connector.opens(), 1);
    assert_eq!(h.manager.session().epoch, 1);
}

#[tokio::test(start_paused = true)]
async fn engine_pings_are_answered_and_inbound_events_carry_the_epoch() {
    let mut h = harness();
    let mut server = h.online().await;

    server.send(&Packet::Ping);
    assert_eq!(server.next_packet().await, Some(Packet::Pong));

    server.send_raw("42not json");
    server.emit("mystery-event", json!({}));
    server.emit("user-count", json!({ "count": 3 }));

    let inbound = loop {
        let event = h.events.recv().await.unwrap();
        if matches!(event, ClientEvent::Inbound { .. }) {
            break event;
        }
    };
    assert_eq!(
        inbound,
        ClientEvent::Inbound {
            epoch: 1,
            event: InboundEvent::UserCount(UserCount { count: 3 }),
        }
    );
}

// =============================================================================
// HEARTBEAT
// =============================================================================

#[tokio::test(start_paused = true)]
async fn heartbeat_measures_latency_from_matching_pong() {
    let mut h = harness();
    let mut server = h.online().await;

    let (name, data) = server.next_event().await.unwrap();
    assert_eq!(name, "ping");
    let timestamp = data["timestamp"].as_i64().unwrap();

    tokio::time::advance(Duration::from_millis(40)).await;
    server.emit("pong", json!({ "timestamp": timestamp }));

    let latency = loop {
        if let ClientEvent::Latency(latency) = h.events.recv().await.unwrap() {
            break latency;
        }
    };
    assert_eq!(latency, Some(Duration::from_millis(40)));
    assert_eq!(h.manager.session().latency, Some(Duration::from_millis(40)));
}

#[tokio::test(start_paused = true)]
async fn pings_unanswered_by_the_next_interval_count_as_misses() {
    let mut config = config();
    config.heartbeat = HeartbeatConfig {
        interval: Duration::from_secs(5),
        timeout: Duration::from_secs(30),
        max_misses: 3,
    };
    let mut h = harness_with(config, Identity::new("Ann", Role::Worker));
    let _server = h.online().await;
    let start = Instant::now();

    assert_eq!(h.wait_for_status(ConnectionStatus::Reconnecting).await, 1);
    assert!(start.elapsed() <= Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn three_missed_heartbeats_force_a_reconnect() {
    let mut h = harness();
    let mut server = h.online().await;

    for _ in 0..3 {
        let (name, _) = server.next_event().await.unwrap();
        assert_eq!(name, "ping");
    }

    let mut second = h.accept().await;
    assert_eq!(server.next_packet().await, None);
    assert_eq!(h.wait_for_status(ConnectionStatus::Reconnecting).await, 1);
    assert_eq!(h.next_status().await, (ConnectionStatus::Connecting, 2));
    assert_eq!(h.connector.opens(), 2);

    second.handshake("sock-2").await;
    assert_eq!(h.wait_for_status(ConnectionStatus::Connected).await, 2);
    assert_eq!(h.manager.session().socket_id.as_deref(), Some("sock-2"));
    let (name, _) = second.next_event().await.unwrap();
    assert_eq!(name, "join-tracking");
}

// =============================================================================
// RECONNECT AND BACKOFF
// =============================================================================

#[tokio::test(start_paused = true)]
async fn ten_failed_attempts_park_disconnected_with_terminal_error() {
    let mut h = harness();
    h.connector.set_refusing(true);
    h.manager.connect().unwrap();

    let mut attempt_times = Vec::new();
    loop {
        match h.events.recv().await.unwrap() {
            ClientEvent::Status {
                status: ConnectionStatus::Connecting,
                ..
            } => attempt_times.push(Instant::now()),
            ClientEvent::Status {
                status: ConnectionStatus::Disconnected,
                ..
            } => break,
            _ => {}
        }
    }

    assert_eq!(attempt_times.len(), 10);
    let gaps: Vec<Duration> = attempt_times.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps[0] >= Duration::from_secs(1) && gaps[0] <= Duration::from_millis(1500));
    for pair in gaps.windows(2) {
        assert!(pair[1] >= pair[0], "backoff shrank: {gaps:?}");
    }
    assert!(gaps.iter().all(|gap| *gap <= Duration::from_secs(30)));

    let session = h.manager.session();
    assert_eq!(session.status, ConnectionStatus::Disconnected);
    assert!(session.terminal);
    assert_eq!(session.reconnect_attempts, 10);
    assert!(session.last_error.unwrap().contains("reconnect manually"));

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.connector.opens(), 10);
    assert!(h.manager.armed_timers().await.unwrap().is_empty());

    // A manual connect starts over.
    h.connector.set_refusing(false);
    h.manager.connect().unwrap();
    let mut server = h.accept().await;
    server.handshake("sock-9").await;
    h.wait_for_status(ConnectionStatus::Connected).await;
    let session = h.manager.session();
    assert!(!session.terminal);
    assert_eq!(session.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn lost_connection_retries_and_resets_attempts_once_connected() {
    let mut h = harness();
    let server = h.online().await;

    h.connector.set_refusing(true);
    server.close(CloseReason::Server);

    for _ in 0..3 {
        h.wait_for_status(ConnectionStatus::Reconnecting).await;
    }
    assert_eq!(h.manager.session().reconnect_attempts, 2);
    assert!(h.manager.session().next_retry_in.is_some());

    h.connector.set_refusing(false);
    let mut next = h.accept().await;
    next.handshake("sock-4").await;
    assert_eq!(h.wait_for_status(ConnectionStatus::Connected).await, 4);

    let session = h.manager.session();
    assert_eq!(session.reconnect_attempts, 0);
    assert_eq!(session.next_retry_in, None);
    assert_eq!(session.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn handshake_that_never_finishes_times_out() {
    let mut h = harness();
    h.manager.connect().unwrap();
    let _server = h.accept().await;
    let start = Instant::now();

    h.wait_for_status(ConnectionStatus::Reconnecting).await;
    assert_eq!(start.elapsed(), Duration::from_secs(20));
    let session = h.manager.session();
    assert_eq!(session.reconnect_attempts, 1);
    assert_eq!(session.last_error.as_deref(), Some("timed out opening the connection"));
    let retry = session.next_retry_in.unwrap();
    assert!(retry >= Duration::from_secs(1) && retry <= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn connect_error_counts_as_a_failed_attempt() {
    let mut h = harness();
    h.manager.connect().unwrap();
    let mut server = h.accept().await;
    server.open();
    assert!(matches!(server.next_packet().await, Some(Packet::Connect(_))));
    server.send(&Packet::ConnectError(json!({ "message": "invalid token" })));

    h.wait_for_status(ConnectionStatus::Reconnecting).await;
    let session = h.manager.session();
    assert_eq!(session.reconnect_attempts, 1);
    assert!(session.last_error.unwrap().contains("invalid token"));
    assert_eq!(session.socket_id, None);
}

// =============================================================================
// TEARDOWN
// =============================================================================

#[tokio::test(start_paused = true)]
async fn disconnect_leaves_no_timers_and_dispatches_nothing_afterward() {
    let mut h = harness();
    let mut server = h.online().await;
    h.manager.notify_typing().unwrap();
    assert_eq!(server.next_event().await.unwrap().0, "typing-start");

    h.manager.disconnect().await.unwrap();

    assert_eq!(server.next_packet().await, Some(Packet::Disconnect));
    assert_eq!(server.next_packet().await, None);
    assert!(h.manager.armed_timers().await.unwrap().is_empty());

    let session = h.manager.session();
    assert_eq!(session.status, ConnectionStatus::Disconnected);
    assert_eq!(session.socket_id, None);
    assert_eq!(session.latency, None);
    assert!(!session.terminal);

    h.wait_for_status(ConnectionStatus::Disconnected).await;
    tokio::time::sleep(config().heartbeat.interval * 2).await;
    assert!(matches!(h.events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(h.connector.opens(), 1);
    assert_eq!(h.manager.notify_typing(), Err(SendError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_backoff_cancels_the_retry() {
    let mut h = harness();
    h.connector.set_refusing(true);
    h.manager.connect().unwrap();
    h.wait_for_status(ConnectionStatus::Reconnecting).await;
    assert!(h.manager.armed_timers().await.unwrap().contains(&TimerKind::Backoff));

    h.manager.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.connector.opens(), 1);
    assert_eq!(h.manager.status(), ConnectionStatus::Disconnected);
    assert_eq!(h.manager.session().reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_says_goodbye_and_stops_the_driver() {
    let mut h = harness();
    let mut server = h.online().await;
    let Harness { manager, .. } = h;

    manager.shutdown().await;
    assert_eq!(server.next_packet().await, Some(Packet::Disconnect));
    assert_eq!(server.next_packet().await, None);
}

// =============================================================================
// GESTURES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn gestures_are_rejected_while_disconnected() {
    let h = harness();

    assert_eq!(h.manager.send_message("hello"), Err(SendError::NotConnected));
    assert_eq!(
        h.manager.send_message("   "),
        Err(SendError::Message(MessageError::Empty))
    );
    assert_eq!(
        h.manager.react("m1", "👍", ReactionAction::Add),
        Err(SendError::NotConnected)
    );
    assert_eq!(h.manager.notify_typing(), Err(SendError::NotConnected));
    assert_eq!(h.manager.set_status(UserStatus::Away), Err(SendError::NotConnected));
    assert_eq!(h.manager.send_location(report(1.0, 2.0)), Ok(()));
}

#[tokio::test(start_paused = true)]
async fn typing_starts_once_and_stops_after_idle_or_send() {
    let mut h = harness();
    let mut server = h.online().await;

    h.manager.notify_typing().unwrap();
    h.manager.notify_typing().unwrap();
    assert_eq!(server.next_event().await.unwrap().0, "typing-start");
    let start = Instant::now();
    assert_eq!(server.next_event().await.unwrap().0, "typing-stop");
    assert_eq!(start.elapsed(), Duration::from_secs(3));

    h.manager.notify_typing().unwrap();
    assert_eq!(server.next_event().await.unwrap().0, "typing-start");
    h.manager.send_message("  on site  ").unwrap();
    assert_eq!(server.next_event().await.unwrap().0, "typing-stop");
    let (name, data) = server.next_event().await.unwrap();
    assert_eq!(name, "send-message");
    assert_eq!(data, json!({ "message": "on site", "messageType": "text" }));
}

#[tokio::test(start_paused = true)]
async fn connected_gestures_reach_the_wire() {
    let mut h = harness();
    let mut server = h.online().await;

    h.manager.send_location(report(40.5, -105.5)).unwrap();
    h.manager.react("m1", "👍", ReactionAction::Remove).unwrap();
    h.manager.set_status(UserStatus::Away).unwrap();
    h.manager.report_activity(true).unwrap();

    let (name, data) = server.next_event().await.unwrap();
    assert_eq!(name, "location-update");
    assert_eq!(data["location"]["latitude"], 40.5);

    let (name, data) = server.next_event().await.unwrap();
    assert_eq!(name, "message-reaction");
    assert_eq!(data, json!({ "messageId": "m1", "emoji": "👍", "action": "remove" }));

    let (name, data) = server.next_event().await.unwrap();
    assert_eq!(name, "status-update");
    assert_eq!(data, json!({ "status": "away" }));

    let (name, data) = server.next_event().await.unwrap();
    assert_eq!(name, "presence-update");
    assert_eq!(data["isActive"], true);
    assert!(data["lastActivity"].as_i64().is_some());
}
