//! Request history capture
//!
//! One item per outbound LMS call, enough to reconstruct the exchange for
//! debugging: method, resolved URL, payload, status, latency, response (or
//! transport error), and the batch position for looped sub-operations.
//! The buffer is append-only within one operator action and reset when the
//! next action begins.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHistoryItem {
    pub method: String,
    pub url: String,
    pub payload: Value,
    pub status: Option<u16>,
    pub response: Option<Value>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_item: Option<String>,
}

/// Mutex-guarded per-action history buffer owned by one LMS client.
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    items: Mutex<Vec<RequestHistoryItem>>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // a panic while holding the lock leaves the Vec itself intact, so a
    // poisoned guard is recovered rather than propagated
    fn items(&self) -> std::sync::MutexGuard<'_, Vec<RequestHistoryItem>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, item: RequestHistoryItem) {
        self.items().push(item);
    }

    pub fn clear(&self) {
        self.items().clear();
    }

    pub fn snapshot(&self) -> Vec<RequestHistoryItem> {
        self.items().clone()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
