//! Shared application state handed to every handler

use std::sync::Arc;
use std::time::Duration;

use crate::client_cache::ClientCache;
use crate::config::AppConfig;
use crate::crypto;
use crate::environment::{EnvironmentStore, SledEnvironmentStore};
use crate::errors::{AutomationError, AutomationResult};
use crate::exec_history::{CloneHistoryStore, SledCloneHistoryStore};
use crate::kpi_table::KpiTable;

pub struct AppState {
    pub environments: Arc<dyn EnvironmentStore>,
    pub clone_history: Arc<dyn CloneHistoryStore>,
    pub client_cache: ClientCache,
    pub kpi_table: KpiTable,
    pub encryption_key: [u8; 32],
    pub http_timeout: Duration,
}

impl AppState {
    /// Build production state from config: sled-backed stores under
    /// `data_dir`, the KPI table from its configured path or the bundled
    /// default.
    pub fn from_config(config: &AppConfig) -> AutomationResult<Self> {
        let encryption_key = crypto::decode_base64_key(&config.encryption_key_b64)
            .map_err(|e| AutomationError::config(format!("encryption_key_b64: {e}")))?;

        let db = sled::open(&config.data_dir)
            .map_err(|e| AutomationError::store("open data dir", e))?;

        let kpi_table = match &config.kpi_table_path {
            Some(path) => KpiTable::from_file(path)?,
            None => KpiTable::builtin(),
        };

        Ok(Self {
            environments: Arc::new(SledEnvironmentStore::new(db.clone())),
            clone_history: Arc::new(SledCloneHistoryStore::new(db)),
            client_cache: ClientCache::new(Duration::from_secs(config.client_cache_ttl_secs)),
            kpi_table,
            encryption_key,
            http_timeout: Duration::from_secs(config.http_timeout_secs),
        })
    }
}
