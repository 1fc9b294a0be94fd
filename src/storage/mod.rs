//! Key-value persistence collaborator: risk state, audit log, global risk.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Well-known store keys.
pub mod keys {
    pub const GLOBAL_RISK: &str = "global_risk_score";
    pub const AUDIT_LOG: &str = "audit_log";

    pub fn domain_state(domain: &str) -> String {
        format!("domain_state/{domain}")
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;
    async fn put_raw(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

pub async fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match store.get_raw(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .map_err(|e| EngineError::Persistence(format!("decode {key}: {e}")))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub async fn put_json<T: Serialize + Sync>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| EngineError::Persistence(format!("encode {key}: {e}")))?;
    store.put_raw(key, &raw).await
}

/// In-memory store for tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().expect("store lock").get(key).cloned())
    }

    async fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .expect("store lock")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.lock().expect("store lock").remove(key);
        Ok(())
    }
}
