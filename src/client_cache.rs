//! Per-operator LMS client reuse
//!
//! Keyed by `{admin}-{environment}-{dmn}-{user_code}` so one operator's
//! session against one target is reused instead of logging in per request.
//! Eviction is lazy: an entry older than the TTL is dropped on the read
//! that finds it. There is deliberately no cross-request locking around
//! login: two concurrent misses for the same key may both authenticate, and
//! whichever `set` runs last wins. Logins are idempotent on the LMS side,
//! so the loser's client is simply discarded unused.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::lms_client::LmsClient;

pub struct ClientCache {
    entries: RwLock<HashMap<String, (Arc<LmsClient>, Instant)>>,
    ttl: Duration,
}

impl ClientCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn key(admin_user: &str, environment_id: &Uuid, dmn: &str, user_code: &str) -> String {
        format!("{admin_user}-{environment_id}-{dmn}-{user_code}")
    }

    /// Return the cached client if present and younger than the TTL;
    /// evict and miss otherwise.
    pub async fn get(&self, key: &str) -> Option<Arc<LmsClient>> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some((client, stored_at)) if stored_at.elapsed() <= self.ttl => Some(client.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a client, unconditionally overwriting any prior entry.
    pub async fn set(&self, key: String, client: Arc<LmsClient>) {
        let mut entries = self.entries.write().await;
        entries.insert(key, (client, Instant::now()));
    }

    /// Explicit clear for one key; reports whether an entry was present.
    pub async fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(key).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
