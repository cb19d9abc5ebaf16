use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, interval_at, timeout};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message, WebSocketConfig};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::realtime::connection::frames::{ControlFrame, OutboundFrame};
use crate::realtime::connection::state::{
    CloseReason, ConnectionHandle, ConnectionId, ConnectionState,
};
use crate::realtime::registry::RegistryHandle;
use crate::shared::config::RealtimeSettings;

const LOG_TARGET: &str = "realtime::connection";

/// Protocol limits for a served socket. Frames over `max_message_size` are
/// refused while being read instead of after buffering.
pub fn websocket_config(settings: &RealtimeSettings) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(settings.max_message_size);
    config.max_frame_size = Some(settings.max_message_size);
    config
}

/// Drives one client connection from registration to `Closed`: registers
/// with the registry, runs the reader and writer tasks, and tears both
/// down once the connection leaves `Active`. Returns why it closed.
pub async fn run_session<S>(
    socket: S,
    registry: RegistryHandle,
    initial_tables: HashSet<Uuid>,
    settings: RealtimeSettings,
) -> CloseReason
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + 'static,
{
    let id = ConnectionId::new();
    let (state_tx, mut state_rx) = watch::channel(ConnectionState::Connecting);
    let (out_tx, out_rx) = mpsc::channel(settings.outbound_queue_capacity.max(1));
    let handle = ConnectionHandle::new(id, out_tx, Arc::new(state_tx));

    if let Err(e) = registry.register(handle.clone(), initial_tables.clone()).await {
        warn!(target: LOG_TARGET, connection_id = %id, error = %e, "Registration failed");
        handle.close(CloseReason::Shutdown);
        handle.finish();
        return CloseReason::Shutdown;
    }
    handle.activate();
    info!(
        target: LOG_TARGET,
        connection_id = %id,
        tables = initial_tables.len(),
        "Connection active"
    );

    let (sink, stream) = socket.split();
    let last_seen = Arc::new(Mutex::new(Instant::now()));

    let writer = tokio::spawn(outbound_loop(
        sink,
        out_rx,
        handle.clone(),
        Arc::clone(&last_seen),
        settings.clone(),
    ));
    let reader = tokio::spawn(inbound_loop(
        stream,
        registry.clone(),
        handle.clone(),
        last_seen,
        settings.max_message_size,
    ));

    let reason = match state_rx.wait_for(|state| !state.is_open()).await {
        Ok(state) => state.close_reason().unwrap_or(CloseReason::PeerClosed),
        Err(_) => CloseReason::PeerClosed,
    };

    // Interest goes away before the queue is drained.
    if let Err(e) = registry.unregister(id).await {
        debug!(target: LOG_TARGET, connection_id = %id, error = %e, "Unregister skipped");
    }

    let _ = writer.await;
    reader.abort();
    let _ = reader.await;
    handle.finish();

    info!(target: LOG_TARGET, connection_id = %id, reason = reason.as_str(), "Connection closed");
    reason
}

async fn inbound_loop<R>(
    mut stream: R,
    registry: RegistryHandle,
    handle: ConnectionHandle,
    last_seen: Arc<Mutex<Instant>>,
    max_message_size: usize,
) where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let id = handle.id();
    let reason = loop {
        let message = match stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(WsError::Capacity(e))) => {
                debug!(target: LOG_TARGET, connection_id = %id, error = %e, "Inbound frame over limit");
                break CloseReason::MessageTooLarge;
            }
            Some(Err(e)) => {
                debug!(target: LOG_TARGET, connection_id = %id, error = %e, "Read failed");
                break CloseReason::ProtocolError;
            }
            None => break CloseReason::PeerClosed,
        };
        *last_seen.lock() = Instant::now();

        match message {
            Message::Text(text) => {
                if text.len() > max_message_size {
                    break CloseReason::MessageTooLarge;
                }
                on_control(&text, &registry, &handle).await;
            }
            Message::Binary(data) => {
                if data.len() > max_message_size {
                    break CloseReason::MessageTooLarge;
                }
                debug!(target: LOG_TARGET, connection_id = %id, "Ignoring binary frame");
            }
            Message::Close(_) => break CloseReason::PeerClosed,
            // Pings are answered by the protocol layer.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    };
    handle.close(reason);
}

pub(super) async fn on_control(text: &str, registry: &RegistryHandle, handle: &ConnectionHandle) {
    let id = handle.id();
    let reply = match ControlFrame::parse(text) {
        Ok(ControlFrame::Subscribe { table_id }) => {
            match registry.subscribe(id, table_id).await {
                Ok(true) => OutboundFrame::subscribed(table_id),
                Ok(false) => OutboundFrame::error("connection is not registered"),
                Err(e) => OutboundFrame::error(&e.to_string()),
            }
        }
        Ok(ControlFrame::Unsubscribe { table_id }) => {
            match registry.unsubscribe(id, table_id).await {
                Ok(true) => OutboundFrame::unsubscribed(table_id),
                Ok(false) => OutboundFrame::error("connection is not registered"),
                Err(e) => OutboundFrame::error(&e.to_string()),
            }
        }
        Err(e) => {
            debug!(target: LOG_TARGET, connection_id = %id, error = %e, "Invalid control frame");
            OutboundFrame::error("invalid control frame")
        }
    };
    // Replies are best-effort; a full queue is handled by the next event.
    let _ = handle.try_deliver(reply);
}

async fn outbound_loop<K>(
    mut sink: K,
    mut queue: mpsc::Receiver<OutboundFrame>,
    handle: ConnectionHandle,
    last_seen: Arc<Mutex<Instant>>,
    settings: RealtimeSettings,
) where
    K: Sink<Message, Error = WsError> + Unpin,
{
    let id = handle.id();
    let mut state = handle.subscribe_state();
    let period = settings.heartbeat_interval().max(Duration::from_millis(1));
    // Pings go out only after a full idle period without writes.
    let mut heartbeat = interval_at(Instant::now() + period, period);
    let write_timeout = settings.write_timeout();

    while state.borrow().is_open() {
        tokio::select! {
            frame = queue.recv() => {
                let Some(frame) = frame else { break };
                if let Err(reason) = write(&mut sink, frame.into_message(), write_timeout).await {
                    handle.close(reason);
                    break;
                }
                heartbeat.reset();
            }
            _ = heartbeat.tick() => {
                if last_seen.lock().elapsed() > settings.pong_timeout() {
                    debug!(target: LOG_TARGET, connection_id = %id, "Peer missed heartbeat");
                    handle.close(CloseReason::PeerUnresponsive);
                    break;
                }
                if let Err(reason) = write(&mut sink, Message::Ping(Vec::new()), write_timeout).await {
                    handle.close(reason);
                    break;
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    let reason = handle.state().close_reason().unwrap_or(CloseReason::PeerClosed);
    if reason == CloseReason::WriteFailed {
        return;
    }

    // Best-effort drain and close handshake, bounded by the grace period.
    let drained = timeout(settings.shutdown_grace(), async {
        let mut flushed = 0usize;
        if reason.drains() {
            while let Ok(frame) = queue.try_recv() {
                if sink.feed(frame.into_message()).await.is_err() {
                    return flushed;
                }
                flushed += 1;
            }
        }
        let close = CloseFrame {
            code: reason.close_code(),
            reason: reason.as_str().into(),
        };
        let _ = sink.send(Message::Close(Some(close))).await;
        flushed
    })
    .await;

    match drained {
        Ok(flushed) => {
            debug!(target: LOG_TARGET, connection_id = %id, flushed, "Outbound drained");
        }
        Err(_) => {
            warn!(target: LOG_TARGET, connection_id = %id, "Outbound drain timed out; dropping queue");
        }
    }
}

async fn write<K>(sink: &mut K, message: Message, limit: Duration) -> Result<(), CloseReason>
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    match timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(WsError::ConnectionClosed)) | Ok(Err(WsError::AlreadyClosed)) => {
            Err(CloseReason::PeerClosed)
        }
        Ok(Err(_)) | Err(_) => Err(CloseReason::WriteFailed),
    }
}
