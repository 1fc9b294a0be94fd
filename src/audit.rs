//! Bounded audit log: most-recent-first ring persisted through the store.

use crate::error::Result;
use crate::policy::EnforcementMode;
use crate::storage::{get_json, keys, put_json, KvStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum retained entries; older ones fall off the end.
pub const AUDIT_CAPACITY: usize = 100;

/// Audit event kinds.
pub mod kind {
    pub const BLOCK_REQUEST_AI: &str = "BLOCK_REQUEST_AI";
    pub const BLOCK_REQUEST_FASTPATH: &str = "BLOCK_REQUEST_FASTPATH";
    pub const BLOCK_REQUEST_FAILCLOSED: &str = "BLOCK_REQUEST_FAILCLOSED";
    pub const BLOCK_DOMAIN_ZERO_TRUST: &str = "BLOCK_DOMAIN_ZERO_TRUST";
    pub const BLOCK_DOMAIN_MANUAL: &str = "BLOCK_DOMAIN_MANUAL";
    pub const UNBLOCK_DOMAIN: &str = "UNBLOCK_DOMAIN";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub kind: String,
    pub domain: String,
    pub mode: EnforcementMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEntry {
    pub fn new(kind: &str, domain: &str, mode: EnforcementMode) -> Self {
        Self {
            ts: Utc::now(),
            kind: kind.to_string(),
            domain: domain.to_string(),
            mode,
            probability: None,
            reason: None,
        }
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = Some(probability);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

pub struct AuditLog {
    store: Arc<dyn KvStore>,
    capacity: usize,
    // The ring lives under a single key; serialize writers so concurrent
    // events cannot drop each other's entries.
    write_lock: tokio::sync::Mutex<()>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_capacity(store, AUDIT_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn KvStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn record(&self, entry: AuditEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries: Vec<AuditEntry> = get_json(self.store.as_ref(), keys::AUDIT_LOG)
            .await?
            .unwrap_or_default();
        entries.insert(0, entry);
        entries.truncate(self.capacity);
        put_json(self.store.as_ref(), keys::AUDIT_LOG, &entries).await
    }

    /// Entries, most recent first.
    pub async fn entries(&self) -> Result<Vec<AuditEntry>> {
        Ok(get_json(self.store.as_ref(), keys::AUDIT_LOG)
            .await?
            .unwrap_or_default())
    }
}
