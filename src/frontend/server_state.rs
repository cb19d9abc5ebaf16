use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Server-wide shutdown flag shared by the listeners.
#[derive(Clone, Default)]
pub struct ServerState {
    shutdown: Arc<AtomicBool>,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the server is shutting down
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Signals that the server should start shutting down
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
