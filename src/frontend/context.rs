use std::sync::Arc;
use tracing::info;

use crate::engine::catalog::MemoryFieldCatalog;
use crate::engine::query::QueryExecutor;
use crate::engine::records::RecordService;
use crate::engine::store::MemoryRecordStore;
use crate::frontend::server_state::ServerState;
use crate::realtime::{ChangePublisher, MemoryBroker, Realtime};
use crate::shared::config::{CONFIG, QueryConfig, RealtimeSettings};

/// Everything the listeners share: the catalog, the record service and the
/// realtime hub of this process.
pub struct FrontendContext {
    pub catalog: Arc<MemoryFieldCatalog>,
    pub records: Arc<RecordService>,
    pub realtime: Arc<Realtime>,
    pub server_state: Arc<ServerState>,
}

impl FrontendContext {
    pub fn from_config() -> Arc<Self> {
        Self::new(&MemoryBroker::new(), CONFIG.realtime.clone(), &CONFIG.query)
    }

    /// Wires a process against `broker`. Contexts sharing one broker behave
    /// like separate backend processes behind the same pub/sub service.
    pub fn new(broker: &MemoryBroker, realtime: RealtimeSettings, query: &QueryConfig) -> Arc<Self> {
        let catalog = Arc::new(MemoryFieldCatalog::new());
        let store = Arc::new(MemoryRecordStore::new());

        let executor = QueryExecutor::new(catalog.clone(), store.clone())
            .with_max_page_size(query.max_page_size);
        let publisher = ChangePublisher::new(Arc::new(broker.connect()));
        let records = RecordService::new(store, executor).with_publisher(publisher);
        let realtime = Realtime::start(Arc::new(broker.connect()), realtime);

        Arc::new(Self {
            catalog,
            records: Arc::new(records),
            realtime,
            server_state: Arc::new(ServerState::new()),
        })
    }

    /// Stops accepting connections, then closes realtime sessions and
    /// releases broker subscriptions.
    pub async fn shutdown(&self) {
        info!(target: "frontend", "Shutting down");
        self.server_state.signal_shutdown();
        self.realtime.shutdown().await;
    }
}
