//! LMS environment targets and their persistence
//!
//! An `Environment` names one external LMS deployment: where it lives, the
//! default domain, the encrypted root/master passwords, and the headers and
//! base parameters every call against it should carry. Environments are
//! administered over the HTTP API and are read-only at automation time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::{AutomationError, AutomationResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: Uuid,
    pub name: String,
    /// Base URL of the LMS, e.g. `https://lms.example.com`.
    pub host: String,
    pub default_dmn: String,
    /// base64(nonce || ciphertext) under the server AES key.
    pub master_password_enc: Option<String>,
    pub root_password_enc: Option<String>,
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    /// Merged into every outbound payload before call-specific fields.
    #[serde(default)]
    pub base_params: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire form of an environment; never exposes the stored secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSummary {
    pub id: Uuid,
    pub name: String,
    pub host: String,
    pub default_dmn: String,
    pub has_master_password: bool,
    pub has_root_password: bool,
    pub default_headers: BTreeMap<String, String>,
    pub base_params: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Environment> for EnvironmentSummary {
    fn from(env: &Environment) -> Self {
        Self {
            id: env.id,
            name: env.name.clone(),
            host: env.host.clone(),
            default_dmn: env.default_dmn.clone(),
            has_master_password: env.master_password_enc.is_some(),
            has_root_password: env.root_password_enc.is_some(),
            default_headers: env.default_headers.clone(),
            base_params: env.base_params.clone(),
            created_at: env.created_at,
            updated_at: env.updated_at,
        }
    }
}

pub trait EnvironmentStore: Send + Sync {
    fn get(&self, id: &Uuid) -> AutomationResult<Option<Environment>>;
    fn list(&self) -> AutomationResult<Vec<Environment>>;
    fn upsert(&self, env: &Environment) -> AutomationResult<()>;
    fn delete(&self, id: &Uuid) -> AutomationResult<bool>;
}

/// Sled-backed implementation, one record per environment id.
pub struct SledEnvironmentStore {
    db: sled::Db,
}

impl SledEnvironmentStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    fn tree(&self) -> AutomationResult<sled::Tree> {
        self.db
            .open_tree("environments")
            .map_err(|e| AutomationError::store("open environments tree", e))
    }

    fn serialize(env: &Environment) -> AutomationResult<Vec<u8>> {
        serde_json::to_vec(env).map_err(|e| AutomationError::serialization("environment", e))
    }

    fn deserialize(bytes: &[u8]) -> AutomationResult<Environment> {
        serde_json::from_slice(bytes).map_err(|e| AutomationError::serialization("environment", e))
    }
}

impl EnvironmentStore for SledEnvironmentStore {
    fn get(&self, id: &Uuid) -> AutomationResult<Option<Environment>> {
        let tree = self.tree()?;
        match tree
            .get(id.as_bytes())
            .map_err(|e| AutomationError::store("environment read", e))?
        {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> AutomationResult<Vec<Environment>> {
        let tree = self.tree()?;
        let mut out = Vec::new();
        for item in tree.iter() {
            let (_, bytes) = item.map_err(|e| AutomationError::store("environment scan", e))?;
            out.push(Self::deserialize(&bytes)?);
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn upsert(&self, env: &Environment) -> AutomationResult<()> {
        let tree = self.tree()?;
        let data = Self::serialize(env)?;
        tree.insert(env.id.as_bytes(), data)
            .map_err(|e| AutomationError::store("environment write", e))?;
        tree.flush()
            .map_err(|e| AutomationError::store("environment flush", e))?;
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> AutomationResult<bool> {
        let tree = self.tree()?;
        let removed = tree
            .remove(id.as_bytes())
            .map_err(|e| AutomationError::store("environment delete", e))?
            .is_some();
        tree.flush()
            .map_err(|e| AutomationError::store("environment flush", e))?;
        Ok(removed)
    }
}
