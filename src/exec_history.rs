//! Clone-execution audit records
//!
//! Every clone-program attempt, successful or not, is recorded with its
//! inputs, outcome, duration, and the full request history, so an operator
//! can audit what was actually sent. Writes are fire-and-forget: a failed
//! write is logged and never fails the user-facing response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AutomationError, AutomationResult};
use crate::history::RequestHistoryItem;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneExecutionRecord {
    pub id: Uuid,
    pub admin_user: String,
    pub environment_id: Uuid,
    pub dmn: String,
    pub program_iid: i64,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub request_history: Vec<RequestHistoryItem>,
    pub created_at: DateTime<Utc>,
}

pub trait CloneHistoryStore: Send + Sync {
    fn append(&self, record: &CloneExecutionRecord) -> AutomationResult<()>;
    /// Most recent first.
    fn list(&self, limit: usize) -> AutomationResult<Vec<CloneExecutionRecord>>;
}

pub struct SledCloneHistoryStore {
    db: sled::Db,
}

impl SledCloneHistoryStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    fn tree(&self) -> AutomationResult<sled::Tree> {
        self.db
            .open_tree("clone_history")
            .map_err(|e| AutomationError::store("open clone_history tree", e))
    }

    // keys sort chronologically: millis since epoch, then the record id
    fn key_for(record: &CloneExecutionRecord) -> Vec<u8> {
        let mut key = record
            .created_at
            .timestamp_millis()
            .to_be_bytes()
            .to_vec();
        key.extend_from_slice(record.id.as_bytes());
        key
    }
}

impl CloneHistoryStore for SledCloneHistoryStore {
    fn append(&self, record: &CloneExecutionRecord) -> AutomationResult<()> {
        let tree = self.tree()?;
        let data = serde_json::to_vec(record)
            .map_err(|e| AutomationError::serialization("clone execution record", e))?;
        tree.insert(Self::key_for(record), data)
            .map_err(|e| AutomationError::store("clone history write", e))?;
        tree.flush()
            .map_err(|e| AutomationError::store("clone history flush", e))?;
        Ok(())
    }

    fn list(&self, limit: usize) -> AutomationResult<Vec<CloneExecutionRecord>> {
        let tree = self.tree()?;
        let mut out = Vec::new();
        for item in tree.iter().rev().take(limit) {
            let (_, bytes) = item.map_err(|e| AutomationError::store("clone history scan", e))?;
            let record: CloneExecutionRecord = serde_json::from_slice(&bytes)
                .map_err(|e| AutomationError::serialization("clone execution record", e))?;
            out.push(record);
        }
        Ok(out)
    }
}
