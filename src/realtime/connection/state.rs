use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use uuid::Uuid;

use crate::realtime::connection::frames::OutboundFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    ProtocolError,
    MessageTooLarge,
    /// Outbound queue overflowed.
    SlowConsumer,
    PeerUnresponsive,
    WriteFailed,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::PeerClosed => "peer closed",
            CloseReason::ProtocolError => "protocol error",
            CloseReason::MessageTooLarge => "message too large",
            CloseReason::SlowConsumer => "slow consumer",
            CloseReason::PeerUnresponsive => "peer unresponsive",
            CloseReason::WriteFailed => "write failed",
            CloseReason::Shutdown => "server shutting down",
        }
    }

    pub fn close_code(&self) -> CloseCode {
        match self {
            CloseReason::PeerClosed => CloseCode::Normal,
            CloseReason::ProtocolError => CloseCode::Protocol,
            CloseReason::MessageTooLarge => CloseCode::Size,
            CloseReason::SlowConsumer => CloseCode::Policy,
            CloseReason::PeerUnresponsive | CloseReason::WriteFailed => CloseCode::Error,
            CloseReason::Shutdown => CloseCode::Away,
        }
    }

    /// Whether frames still queued are worth flushing before closing.
    pub fn drains(&self) -> bool {
        matches!(self, CloseReason::Shutdown | CloseReason::ProtocolError | CloseReason::MessageTooLarge)
    }
}

/// `Connecting -> Active -> Closing -> Closed`. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Active,
    Closing(CloseReason),
    Closed(CloseReason),
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Active)
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        match self {
            ConnectionState::Closing(reason) | ConnectionState::Closed(reason) => Some(*reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    Full,
    Closed,
}

/// What the registry holds for a live connection: its outbound queue and
/// a way to force it closed.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<OutboundFrame>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionHandle {
    pub fn new(
        id: ConnectionId,
        outbound: mpsc::Sender<OutboundFrame>,
        state: Arc<watch::Sender<ConnectionState>>,
    ) -> Self {
        Self {
            id,
            outbound,
            state,
        }
    }

    /// A handle with a fresh queue and state, for driving the registry
    /// without a transport.
    pub fn detached(
        capacity: usize,
    ) -> (Self, mpsc::Receiver<OutboundFrame>, watch::Receiver<ConnectionState>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Active);
        (Self::new(ConnectionId::new(), tx, Arc::new(state_tx)), rx, state_rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Enqueues without waiting. A full queue is reported, never awaited.
    pub fn try_deliver(&self, frame: OutboundFrame) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    pub fn deliver_event(&self, payload: Bytes) -> Result<(), DeliveryError> {
        self.try_deliver(OutboundFrame::Event(payload))
    }

    pub fn activate(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Active;
                true
            } else {
                false
            }
        })
    }

    /// Moves an open connection to `Closing`. Returns false when it was
    /// already closing, keeping the first reason.
    pub fn close(&self, reason: CloseReason) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_open() {
                *state = ConnectionState::Closing(reason);
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn finish(&self) {
        self.state.send_modify(|state| {
            let reason = state.close_reason().unwrap_or(CloseReason::PeerClosed);
            *state = ConnectionState::Closed(reason);
        });
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}
