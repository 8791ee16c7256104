// src/state.rs
//! Application state

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::chdb::ChDbSession;
use crate::clickhouse::{ClickHouseClient, ClickHouseError};
use crate::config::Config;

/// Central application state. Clone-friendly: every field is an Arc or a
/// cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when `CLICKHOUSE_ENABLED=false`.
    pub clickhouse: Option<ClickHouseClient>,
    /// `None` when chDB is disabled or its session failed to open.
    pub chdb: Option<Arc<ChDbSession>>,
    /// Bounds concurrently executing tool operations (`CLICKHOUSE_THREAD_POOL_SIZE`).
    pub query_slots: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ClickHouseError> {
        let clickhouse = if config.clickhouse.enabled {
            Some(ClickHouseClient::new(&config.clickhouse)?)
        } else {
            tracing::info!("ClickHouse disabled (CLICKHOUSE_ENABLED=false)");
            None
        };

        let chdb = if config.chdb.enabled {
            match ChDbSession::open(&config.chdb) {
                Ok(session) => Some(Arc::new(session)),
                Err(e) => {
                    tracing::error!("Failed to initialize chDB session: {}", e);
                    None
                }
            }
        } else {
            tracing::info!("chDB is disabled, skipping session initialization");
            None
        };

        let slots = config.clickhouse.thread_pool_size;
        tracing::info!("Initialized query pool with {} slots", slots);

        Ok(Self {
            config: Arc::new(config),
            clickhouse,
            chdb,
            query_slots: Arc::new(Semaphore::new(slots)),
        })
    }
}
