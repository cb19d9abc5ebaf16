use futures_util::{Sink, Stream};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{info, warn};
use uuid::Uuid;

use crate::realtime::bridge::BrokerBridge;
use crate::realtime::broker::Broker;
use crate::realtime::connection::{CloseReason, run_session};
use crate::realtime::registry::RegistryHandle;
use crate::shared::config::RealtimeSettings;

const LOG_TARGET: &str = "realtime::hub";

/// The realtime fanout engine of one process: registry actor, broker
/// bridge and the sessions served through it.
pub struct Realtime {
    registry: RegistryHandle,
    settings: RealtimeSettings,
    shutdown: watch::Sender<bool>,
    bridge: Mutex<Option<JoinHandle<()>>>,
    sessions: Arc<AtomicUsize>,
}

impl Realtime {
    /// Starts the registry and the bridge on `broker`, which should be a
    /// client dedicated to this hub's subscriptions.
    pub fn start(broker: Arc<dyn Broker>, settings: RealtimeSettings) -> Arc<Self> {
        let (signal_tx, signal_rx) = mpsc::channel(1);
        let registry = RegistryHandle::spawn(signal_tx);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let bridge = BrokerBridge::new(broker, registry.clone(), signal_rx);
        let bridge = tokio::spawn(bridge.run(shutdown_rx));

        info!(target: LOG_TARGET, "Realtime hub started");
        Arc::new(Self {
            registry,
            settings,
            shutdown,
            bridge: Mutex::new(Some(bridge)),
            sessions: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn settings(&self) -> &RealtimeSettings {
        &self.settings
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.load(Ordering::Acquire)
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Serves one client connection until it closes.
    pub async fn serve<S>(&self, socket: S, initial_table: Option<Uuid>) -> CloseReason
    where
        S: Stream<Item = Result<Message, WsError>>
            + Sink<Message, Error = WsError>
            + Send
            + 'static,
    {
        let _guard = SessionGuard::enter(Arc::clone(&self.sessions));
        let tables: HashSet<Uuid> = initial_table.into_iter().collect();
        run_session(socket, self.registry.clone(), tables, self.settings.clone()).await
    }

    /// Closes every connection, waits up to the grace period for sessions
    /// to drain, then stops the bridge, which unsubscribes all topics.
    pub async fn shutdown(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        info!(target: LOG_TARGET, "Realtime hub shutting down");

        match self.registry.shutdown().await {
            Ok(closed) => info!(target: LOG_TARGET, closed, "Closed connections"),
            Err(e) => warn!(target: LOG_TARGET, error = %e, "Registry already stopped"),
        }

        let deadline = Instant::now() + self.settings.shutdown_grace() + self.settings.write_timeout();
        while self.active_sessions() > 0 && Instant::now() < deadline {
            sleep(Duration::from_millis(20)).await;
        }
        let remaining = self.active_sessions();
        if remaining > 0 {
            warn!(target: LOG_TARGET, remaining, "Sessions still open after grace period");
        }

        let bridge = self.bridge.lock().take();
        if let Some(bridge) = bridge {
            let _ = bridge.await;
        }
        info!(target: LOG_TARGET, "Realtime hub stopped");
    }
}

struct SessionGuard(Arc<AtomicUsize>);

impl SessionGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
