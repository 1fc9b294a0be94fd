//! Rule sink collaborator: the external service that actually installs and
//! removes network-level block rules. The engine only requests creation and
//! removal and keeps the opaque handle it gets back.

use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub type RuleId = u32;

/// First identifier handed out by the allocator.
pub const RULE_ID_BASE: RuleId = 10_000;

/// Opaque handle to an installed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleHandle {
    pub id: RuleId,
}

/// What the rule matches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSpec {
    ExactUrl(String),
    DomainPattern(String),
}

impl MatchSpec {
    /// Filter expression in the sink's syntax.
    pub fn url_filter(&self) -> String {
        match self {
            MatchSpec::ExactUrl(url) => url.clone(),
            MatchSpec::DomainPattern(domain) => format!("||{domain}^"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    Request,
    Domain,
}

#[async_trait]
pub trait RuleSink: Send + Sync {
    async fn create_rule(&self, spec: MatchSpec, scope: RuleScope) -> Result<RuleHandle>;
    async fn remove_rule(&self, handle: RuleHandle) -> Result<()>;
    async fn list_active_rule_ids(&self) -> Result<BTreeSet<RuleId>>;
}

/// Monotonically increasing rule-id source that skips ids already active in
/// the sink, so restarts never collide with surviving rules.
pub struct RuleIdAllocator {
    next: AtomicU32,
}

impl Default for RuleIdAllocator {
    fn default() -> Self {
        Self {
            next: AtomicU32::new(RULE_ID_BASE),
        }
    }
}

impl RuleIdAllocator {
    pub fn allocate(&self, active: &BTreeSet<RuleId>) -> RuleId {
        loop {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if !active.contains(&id) {
                return id;
            }
        }
    }
}

/// In-process sink that records installed rules. Used by the daemon when no
/// platform sink is wired in, and by tests to assert on installed rules.
#[derive(Default)]
pub struct MemorySink {
    rules: Mutex<BTreeMap<RuleId, (MatchSpec, RuleScope)>>,
    ids: RuleIdAllocator,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed an active rule id, as if installed by a previous run.
    pub fn seed_rule(&self, id: RuleId, spec: MatchSpec, scope: RuleScope) {
        self.rules.lock().expect("sink lock").insert(id, (spec, scope));
    }

    pub fn active_rules(&self) -> Vec<(RuleId, MatchSpec, RuleScope)> {
        self.rules
            .lock()
            .expect("sink lock")
            .iter()
            .map(|(id, (spec, scope))| (*id, spec.clone(), *scope))
            .collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.lock().expect("sink lock").len()
    }
}

#[async_trait]
impl RuleSink for MemorySink {
    async fn create_rule(&self, spec: MatchSpec, scope: RuleScope) -> Result<RuleHandle> {
        let mut rules = self.rules.lock().expect("sink lock");
        let active: BTreeSet<RuleId> = rules.keys().copied().collect();
        let id = self.ids.allocate(&active);
        tracing::info!(id, filter = %spec.url_filter(), scope = ?scope, "rule installed");
        rules.insert(id, (spec, scope));
        Ok(RuleHandle { id })
    }

    async fn remove_rule(&self, handle: RuleHandle) -> Result<()> {
        let mut rules = self.rules.lock().expect("sink lock");
        if rules.remove(&handle.id).is_none() {
            return Err(EngineError::Sink(format!("unknown rule id {}", handle.id)));
        }
        tracing::info!(id = handle.id, "rule removed");
        Ok(())
    }

    async fn list_active_rule_ids(&self) -> Result<BTreeSet<RuleId>> {
        Ok(self.rules.lock().expect("sink lock").keys().copied().collect())
    }
}
