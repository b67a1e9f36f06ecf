use super::*;
use tokio::net::TcpListener;

const OPEN: &str = r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!(
        "ws://{}/socket.io/?EIO=4&transport=websocket",
        listener.local_addr().unwrap()
    );
    (listener, url)
}

#[tokio::test]
async fn ws_link_exchanges_text_and_reports_server_close() {
    let (listener, url) = listener().await;
    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(OPEN.into())).await.unwrap();
        let reply = ws.next().await.unwrap().unwrap();
        ws.close(None).await.unwrap();
        reply
    });

    let mut link = WsConnector.open(&url).await.unwrap();
    assert_eq!(link.recv().await, Some(LinkEvent::Text(OPEN.to_owned())));
    assert!(link.send("40".to_owned()));

    assert_eq!(link.recv().await, Some(LinkEvent::Closed(CloseReason::Server)));
    assert_eq!(server.await.unwrap(), Message::Text("40".into()));
}

#[tokio::test]
async fn close_flushes_queued_frames_first() {
    let (listener, url) = listener().await;
    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let mut texts = Vec::new();
        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(text) => texts.push(text.as_str().to_owned()),
                Message::Close(_) => break,
                _ => {}
            }
        }
        texts
    });

    let mut link = WsConnector.open(&url).await.unwrap();
    assert!(link.send(r#"42["typing-stop",{}]"#.to_owned()));
    assert!(link.send("41".to_owned()));
    link.close(Duration::from_secs(1)).await;
    assert!(!link.send("ignored".to_owned()));

    assert_eq!(
        server.await.unwrap(),
        vec![r#"42["typing-stop",{}]"#.to_owned(), "41".to_owned()]
    );
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    let (listener, url) = listener().await;
    drop(listener);

    let error = WsConnector.open(&url).await.err().unwrap();
    assert!(matches!(error, TransportError::Connect(_)));
}

#[test]
fn only_local_closes_skip_reconnect() {
    assert!(!CloseReason::Local.reconnects());
    assert!(CloseReason::Server.reconnects());
    assert!(CloseReason::HeartbeatLost.reconnects());
    assert!(CloseReason::Network("reset".to_owned()).reconnects());
    assert_eq!(CloseReason::HeartbeatLost.to_string(), "heartbeat lost");
}
