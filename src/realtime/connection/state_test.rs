use crate::realtime::connection::frames::OutboundFrame;
use crate::realtime::connection::state::{
    CloseReason, ConnectionHandle, ConnectionId, ConnectionState, DeliveryError,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

#[test]
fn lifecycle_moves_forward_only() {
    let (tx, _rx) = mpsc::channel(4);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
    let handle = ConnectionHandle::new(ConnectionId::new(), tx, Arc::new(state_tx));

    assert!(handle.activate());
    assert!(!handle.activate());
    assert_eq!(*state_rx.borrow(), ConnectionState::Active);

    assert!(handle.close(CloseReason::SlowConsumer));
    assert!(!handle.close(CloseReason::Shutdown));
    assert!(!handle.activate());
    assert_eq!(
        handle.state(),
        ConnectionState::Closing(CloseReason::SlowConsumer)
    );

    handle.finish();
    assert_eq!(
        handle.state(),
        ConnectionState::Closed(CloseReason::SlowConsumer)
    );
    assert!(!handle.close(CloseReason::PeerClosed));
}

#[test]
fn delivery_reports_full_and_closed_queues() {
    let (handle, mut rx, _) = ConnectionHandle::detached(1);
    handle.deliver_event(Bytes::from_static(b"1")).unwrap();
    assert_eq!(
        handle.deliver_event(Bytes::from_static(b"2")),
        Err(DeliveryError::Full)
    );

    assert_eq!(
        rx.try_recv().unwrap(),
        OutboundFrame::Event(Bytes::from_static(b"1"))
    );
    drop(rx);
    assert_eq!(
        handle.try_deliver(OutboundFrame::error("x")),
        Err(DeliveryError::Closed)
    );
}

#[test]
fn close_reasons_map_to_close_codes() {
    assert_eq!(CloseReason::PeerClosed.close_code(), CloseCode::Normal);
    assert_eq!(CloseReason::MessageTooLarge.close_code(), CloseCode::Size);
    assert_eq!(CloseReason::SlowConsumer.close_code(), CloseCode::Policy);
    assert_eq!(CloseReason::Shutdown.close_code(), CloseCode::Away);

    assert!(CloseReason::Shutdown.drains());
    assert!(!CloseReason::SlowConsumer.drains());
    assert!(!CloseReason::PeerUnresponsive.drains());
}

#[test]
fn state_helpers() {
    assert!(ConnectionState::Connecting.is_open());
    assert!(ConnectionState::Active.is_open());
    assert!(!ConnectionState::Closing(CloseReason::Shutdown).is_open());
    assert_eq!(ConnectionState::Active.close_reason(), None);
    assert_eq!(
        ConnectionState::Closed(CloseReason::WriteFailed).close_reason(),
        Some(CloseReason::WriteFailed)
    );
}
