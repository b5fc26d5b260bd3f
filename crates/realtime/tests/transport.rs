use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use flowprep_realtime::{Transport, TransportConfig};
use flowprep_types::{ClientMessage, ConnectionStatus, ServerMessage};

async fn spawn_server<F, Fut>(handler: F) -> SocketAddr
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(ws).await;
    });
    addr
}

fn config_for(addr: SocketAddr) -> TransportConfig {
    TransportConfig::builder()
        .with_ws_base_url(&format!("ws://{addr}"))
        .build()
}

async fn wait_for_ended(transport: &Transport) {
    for _ in 0..100 {
        if transport.status() == ConnectionStatus::Ended {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("transport never reached Ended");
}

#[tokio::test]
async fn inbound_frames_reach_subscribers_and_session_end_terminates() {
    let addr = spawn_server(|mut ws| async move {
        ws.send(Message::Text(
            r#"{"type":"question","content":"Why this role?","turn":1,"max_turns":5}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"type":"session_end","content":"Thanks!"}"#.into(),
        ))
        .await
        .unwrap();
        ws.close(None).await.ok();
    })
    .await;

    let mut transport = Transport::new(16, config_for(addr));
    let mut events = transport.events();
    transport.connect("abc").await.unwrap();
    assert_eq!(transport.status(), ConnectionStatus::Connected);

    match events.recv().await.unwrap() {
        ServerMessage::Question(turn) => {
            assert_eq!(turn.content, "Why this role?");
            assert_eq!(turn.turn, 1);
            assert_eq!(turn.max_turns, Some(5));
        }
        other => panic!("expected question, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        ServerMessage::SessionEnd { content, .. } => assert_eq!(content, "Thanks!"),
        other => panic!("expected session_end, got {other:?}"),
    }
    wait_for_ended(&transport).await;
}

#[tokio::test]
async fn answers_reach_the_wire_as_tagged_json() {
    let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
    let addr = spawn_server(move |mut ws| async move {
        let frame = ws.next().await.unwrap().unwrap();
        seen_tx.send(frame.into_text().unwrap()).unwrap();
    })
    .await;

    let mut transport = Transport::new(16, config_for(addr));
    transport.connect("abc").await.unwrap();
    transport
        .send(ClientMessage::answer("I shipped the migration."))
        .await;

    let raw = tokio::time::timeout(Duration::from_secs(2), seen_rx)
        .await
        .unwrap()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["type"], "answer");
    assert_eq!(value["content"], "I shipped the migration.");
}

#[tokio::test]
async fn unknown_and_malformed_frames_do_not_kill_the_dispatcher() {
    let addr = spawn_server(|mut ws| async move {
        ws.send(Message::Text("{not json".into())).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"unknown_future_type","x":1}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"type":"follow_up","content":"And then?","turn":2}"#.into(),
        ))
        .await
        .unwrap();
    })
    .await;

    let mut transport = Transport::new(16, config_for(addr));
    let mut events = transport.events();
    transport.connect("abc").await.unwrap();

    // The malformed frame is dropped before broadcast, the unknown one
    // arrives as Unknown, and the follow_up still gets through.
    assert!(matches!(
        events.recv().await.unwrap(),
        ServerMessage::Unknown
    ));
    match events.recv().await.unwrap() {
        ServerMessage::FollowUp(turn) => assert_eq!(turn.turn, 2),
        other => panic!("expected follow_up, got {other:?}"),
    }
}

#[tokio::test]
async fn remote_close_collapses_status_to_ended() {
    let addr = spawn_server(|mut ws| async move {
        ws.close(None).await.ok();
    })
    .await;

    let mut transport = Transport::new(16, config_for(addr));
    transport.connect("abc").await.unwrap();
    wait_for_ended(&transport).await;
}

#[tokio::test]
async fn silent_drop_wakes_status_watchers() {
    let addr = spawn_server(|ws| async move {
        // Drop the socket with no close frame and no session_end.
        drop(ws);
    })
    .await;

    let mut transport = Transport::new(16, config_for(addr));
    let mut status = transport.status_changes();
    transport.connect("abc").await.unwrap();

    // No frame ever arrives, so the only termination signal a session loop
    // gets is the status transition.
    tokio::time::timeout(Duration::from_secs(2), async {
        while *status.borrow_and_update() != ConnectionStatus::Ended {
            status.changed().await.unwrap();
        }
    })
    .await
    .expect("status watcher was never woken by the dropped connection");
}

#[tokio::test]
async fn failed_open_collapses_silently_to_ended() {
    // Nothing listens on this port; the open fails but connect() does not
    // surface an error.
    let config = TransportConfig::builder()
        .with_ws_base_url("ws://127.0.0.1:9")
        .build();
    let mut transport = Transport::new(16, config);
    transport.connect("abc").await.unwrap();
    assert_eq!(transport.status(), ConnectionStatus::Ended);
}

#[tokio::test]
async fn send_without_connection_is_a_silent_no_op() {
    let transport = Transport::new(16, TransportConfig::default());
    transport.send(ClientMessage::answer("dropped")).await;
    assert_eq!(transport.status(), ConnectionStatus::Idle);
}

#[tokio::test]
async fn connect_with_empty_session_id_is_a_no_op() {
    let mut transport = Transport::new(16, TransportConfig::default());
    transport.connect("").await.unwrap();
    assert_eq!(transport.status(), ConnectionStatus::Idle);
}

#[tokio::test]
async fn close_is_idempotent_from_any_state() {
    let mut transport = Transport::new(16, TransportConfig::default());
    transport.close();
    assert_eq!(transport.status(), ConnectionStatus::Ended);
    transport.close();
    assert_eq!(transport.status(), ConnectionStatus::Ended);
}

#[tokio::test]
async fn double_connect_does_not_disturb_the_live_connection() {
    let addr = spawn_server(|mut ws| async move {
        // Keep the socket open until the client goes away.
        while ws.next().await.is_some() {}
    })
    .await;

    let mut transport = Transport::new(16, config_for(addr));
    transport.connect("abc").await.unwrap();
    assert!(transport.connect("abc").await.is_err());
    assert_eq!(transport.status(), ConnectionStatus::Connected);
}
