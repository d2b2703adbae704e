//! Shared application state handed to every request handler.

use std::sync::Arc;

use anyhow::Result;

use crate::config::{Config, StoreKind};
use crate::notify::EventBus;
use crate::orchestrator::MissionOrchestrator;
use crate::persistence::{init_database_with, ConnectPolicy, MemoryStore, SqliteStore, StoreBackend};

pub struct AppState {
    orchestrator: MissionOrchestrator<StoreBackend>,
    bus: Arc<EventBus>,
    config: Config,
}

impl AppState {
    pub fn new(store: StoreBackend, bus: Arc<EventBus>, config: Config) -> Self {
        let orchestrator = MissionOrchestrator::new(
            store,
            bus.clone(),
            config.lifecycle_rules(),
            config.store_timeout(),
        );
        Self {
            orchestrator,
            bus,
            config,
        }
    }

    /// Open the configured store and event bus.
    pub async fn from_config(config: Config) -> Result<Self> {
        let store = match config.store {
            StoreKind::Memory => StoreBackend::Memory(MemoryStore::new()),
            StoreKind::Sqlite => {
                let db = init_database_with(
                    &config.database_path,
                    ConnectPolicy {
                        max_connections: config.database_max_connections,
                        retries: config.database_connect_retries,
                        retry_base: std::time::Duration::from_millis(config.database_retry_base_ms),
                    },
                )
                .await?;
                StoreBackend::Sqlite(SqliteStore::new(db))
            }
        };
        let bus = Arc::new(EventBus::new(config.event_capacity));
        Ok(Self::new(store, bus, config))
    }

    pub fn orchestrator(&self) -> &MissionOrchestrator<StoreBackend> {
        &self.orchestrator
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Close the event bus first so subscribers drain, then the store.
    pub async fn shutdown(&self) {
        self.bus.close();
        self.orchestrator.store().close().await;
    }
}
