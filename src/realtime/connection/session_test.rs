use crate::logging::init_for_tests;
use crate::realtime::connection::session::on_control;
use crate::realtime::connection::{
    CloseReason, ConnectionHandle, OutboundFrame, run_session, websocket_config,
};
use crate::realtime::registry::RegistryHandle;
use crate::shared::config::RealtimeSettings;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{Message, Role};
use uuid::Uuid;

type Client = WebSocketStream<DuplexStream>;

fn settings() -> RealtimeSettings {
    RealtimeSettings {
        outbound_queue_capacity: 16,
        heartbeat_interval_ms: 60_000,
        pong_timeout_ms: 120_000,
        write_timeout_ms: 1_000,
        max_message_size: 512,
        shutdown_grace_ms: 500,
    }
}

struct Harness {
    registry: RegistryHandle,
    _signals: mpsc::Receiver<()>,
}

impl Harness {
    fn new() -> Self {
        init_for_tests();
        let (tx, rx) = mpsc::channel(1);
        Self {
            registry: RegistryHandle::spawn(tx),
            _signals: rx,
        }
    }

    async fn connect(
        &self,
        buffer: usize,
        tables: &[Uuid],
        settings: RealtimeSettings,
    ) -> (Client, JoinHandle<CloseReason>) {
        self.connect_with(buffer, tables, settings, false).await
    }

    /// Like `connect`, with the server socket carrying protocol limits.
    async fn connect_limited(
        &self,
        tables: &[Uuid],
        settings: RealtimeSettings,
    ) -> (Client, JoinHandle<CloseReason>) {
        self.connect_with(64 * 1024, tables, settings, true).await
    }

    async fn connect_with(
        &self,
        buffer: usize,
        tables: &[Uuid],
        settings: RealtimeSettings,
        limited: bool,
    ) -> (Client, JoinHandle<CloseReason>) {
        let (server_io, client_io) = tokio::io::duplex(buffer);
        let config = limited.then(|| websocket_config(&settings));
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, config).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let tables: HashSet<Uuid> = tables.iter().copied().collect();
        let session = tokio::spawn(run_session(server, self.registry.clone(), tables, settings));
        (client, session)
    }

    async fn wait_for_interest(&self, table_id: Uuid, present: bool) {
        for _ in 0..200 {
            let desired = self.registry.desired_tables().await.unwrap();
            if desired.contains(&table_id) == present {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("interest in {table_id} never became {present}");
    }
}

/// Next frame other than heartbeats.
async fn next_frame(client: &mut Client) -> Message {
    loop {
        let message = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("frame expected")
            .expect("stream open")
            .expect("valid frame");
        if !matches!(message, Message::Ping(_) | Message::Pong(_)) {
            return message;
        }
    }
}

async fn next_json(client: &mut Client) -> Value {
    match next_frame(client).await {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn finished(session: JoinHandle<CloseReason>) -> CloseReason {
    timeout(Duration::from_secs(3), session)
        .await
        .expect("session should end")
        .unwrap()
}

#[tokio::test]
async fn initial_table_receives_dispatched_events() {
    let harness = Harness::new();
    let table_id = Uuid::new_v4();
    let (mut client, _session) = harness.connect(64 * 1024, &[table_id], settings()).await;
    harness.wait_for_interest(table_id, true).await;

    harness
        .registry
        .dispatch(table_id, Bytes::from_static(br#"{"seq":1}"#))
        .await
        .unwrap();
    assert_eq!(next_json(&mut client).await, json!({"seq": 1}));
}

#[tokio::test]
async fn control_frames_change_interest() {
    let harness = Harness::new();
    let table_id = Uuid::new_v4();
    let (mut client, _session) = harness.connect(64 * 1024, &[], settings()).await;

    let subscribe = json!({"action": "subscribe", "tableId": table_id}).to_string();
    client.send(Message::Text(subscribe)).await.unwrap();
    assert_eq!(
        next_json(&mut client).await,
        json!({"type": "subscribed", "tableId": table_id})
    );
    harness.wait_for_interest(table_id, true).await;

    let unsubscribe = json!({"action": "unsubscribe", "tableId": table_id}).to_string();
    client.send(Message::Text(unsubscribe)).await.unwrap();
    assert_eq!(
        next_json(&mut client).await,
        json!({"type": "unsubscribed", "tableId": table_id})
    );
    harness.wait_for_interest(table_id, false).await;

    client.send(Message::Text("nonsense".into())).await.unwrap();
    assert_eq!(next_json(&mut client).await["type"], "error");
}

#[tokio::test]
async fn peer_close_unregisters() {
    let harness = Harness::new();
    let table_id = Uuid::new_v4();
    let (mut client, session) = harness.connect(64 * 1024, &[table_id], settings()).await;
    harness.wait_for_interest(table_id, true).await;

    client.close(None).await.unwrap();
    assert_eq!(finished(session).await, CloseReason::PeerClosed);
    assert!(harness.registry.desired_tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn oversized_frames_close_the_connection() {
    let harness = Harness::new();
    let (mut client, session) = harness.connect(64 * 1024, &[], settings()).await;

    client.send(Message::Text("x".repeat(2048))).await.unwrap();
    match next_frame(&mut client).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Size),
        other => panic!("expected close frame, got {other:?}"),
    }
    assert_eq!(finished(session).await, CloseReason::MessageTooLarge);
}

#[tokio::test]
async fn protocol_limit_refuses_oversized_frames_while_reading() {
    let harness = Harness::new();
    let (mut client, session) = harness.connect_limited(&[], settings()).await;

    client.send(Message::Text("x".repeat(4096))).await.unwrap();
    match next_frame(&mut client).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Size),
        other => panic!("expected close frame, got {other:?}"),
    }
    assert_eq!(finished(session).await, CloseReason::MessageTooLarge);
}

#[tokio::test]
async fn control_frames_for_unregistered_connection_get_an_error() {
    let harness = Harness::new();
    let table_id = Uuid::new_v4();
    let (handle, mut rx, _) = ConnectionHandle::detached(4);

    let subscribe = json!({"action": "subscribe", "tableId": table_id}).to_string();
    on_control(&subscribe, &harness.registry, &handle).await;
    let unsubscribe = json!({"action": "unsubscribe", "tableId": table_id}).to_string();
    on_control(&unsubscribe, &harness.registry, &handle).await;

    for _ in 0..2 {
        match rx.try_recv().unwrap() {
            OutboundFrame::Notice(text) => {
                let reply: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(reply["type"], "error");
            }
            other => panic!("expected notice, got {other:?}"),
        }
    }
    assert!(harness.registry.desired_tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn stalled_reader_is_evicted_as_slow_consumer() {
    let harness = Harness::new();
    let table_id = Uuid::new_v4();
    let mut tight = settings();
    tight.outbound_queue_capacity = 1;
    tight.write_timeout_ms = 200;
    tight.shutdown_grace_ms = 200;
    // A tiny transport buffer stalls the writer on the first event.
    let (_client, session) = harness.connect(16, &[table_id], tight).await;
    harness.wait_for_interest(table_id, true).await;

    let payload = Bytes::from("e".repeat(200));
    for _ in 0..4 {
        harness.registry.dispatch(table_id, payload.clone()).await.unwrap();
    }

    assert_eq!(finished(session).await, CloseReason::SlowConsumer);
    assert!(harness.registry.desired_tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn heartbeat_pings_the_peer() {
    let harness = Harness::new();
    let mut fast = settings();
    fast.heartbeat_interval_ms = 20;
    let (mut client, _session) = harness.connect(64 * 1024, &[], fast).await;

    let message = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("ping expected")
        .unwrap()
        .unwrap();
    assert!(matches!(message, Message::Ping(_)));
}

#[tokio::test]
async fn heartbeat_waits_for_an_idle_period() {
    let harness = Harness::new();
    let table_id = Uuid::new_v4();
    let mut idle = settings();
    idle.heartbeat_interval_ms = 150;
    let (mut client, _session) = harness.connect(64 * 1024, &[table_id], idle).await;
    harness.wait_for_interest(table_id, true).await;

    let registry = harness.registry.clone();
    let producer = tokio::spawn(async move {
        for seq in 0..15 {
            let payload = Bytes::from(json!({ "seq": seq }).to_string());
            registry.dispatch(table_id, payload).await.unwrap();
            sleep(Duration::from_millis(20)).await;
        }
    });

    for seq in 0..15 {
        let message = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("event expected")
            .unwrap()
            .unwrap();
        match message {
            Message::Text(text) => {
                let event: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(event["seq"], seq);
            }
            other => panic!("expected event {seq} before any heartbeat, got {other:?}"),
        }
    }
    producer.await.unwrap();

    let message = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("ping expected once idle")
        .unwrap()
        .unwrap();
    assert!(matches!(message, Message::Ping(_)));
}

#[tokio::test]
async fn silent_peer_is_closed_as_unresponsive() {
    let harness = Harness::new();
    let mut fast = settings();
    fast.heartbeat_interval_ms = 20;
    fast.pong_timeout_ms = 60;
    // The client never polls, so no pong is ever sent back.
    let (_client, session) = harness.connect(64 * 1024, &[], fast).await;

    assert_eq!(finished(session).await, CloseReason::PeerUnresponsive);
}

#[tokio::test]
async fn shutdown_flushes_queue_then_closes() {
    let harness = Harness::new();
    let table_id = Uuid::new_v4();
    let (mut client, session) = harness.connect(64 * 1024, &[table_id], settings()).await;
    harness.wait_for_interest(table_id, true).await;

    harness
        .registry
        .dispatch(table_id, Bytes::from_static(br#"{"seq":1}"#))
        .await
        .unwrap();
    assert_eq!(harness.registry.shutdown().await.unwrap(), 1);

    assert_eq!(next_json(&mut client).await, json!({"seq": 1}));
    match next_frame(&mut client).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Away),
        other => panic!("expected close frame, got {other:?}"),
    }
    assert_eq!(finished(session).await, CloseReason::Shutdown);
}
