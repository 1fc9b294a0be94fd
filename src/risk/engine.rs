//! Risk state machine: serialized per-domain read-modify-write of persisted
//! risk state, driving rule escalation and de-escalation through the sink.
//!
//! Ordering guarantees: every update for a domain runs under that domain's
//! async mutex, and each event carries a monotonic per-domain sequence
//! number assigned on arrival. An event that finishes after a newer one has
//! already been applied is discarded instead of overwriting fresher state.
//! A sink failure aborts the update before anything is persisted, so stored
//! state never claims a rule that was not actually installed.

use super::{accumulate, transition_for, DomainRiskState, Transition};
use crate::error::{EngineError, Result};
use crate::policy::EnforcementMode;
use crate::sink::{MatchSpec, RuleScope, RuleSink};
use crate::storage::{get_json, keys, put_json, KvStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

struct DomainSlot {
    lock: tokio::sync::Mutex<()>,
    next_seq: AtomicU64,
    applied_seq: AtomicU64,
}

impl Default for DomainSlot {
    fn default() -> Self {
        Self {
            lock: tokio::sync::Mutex::new(()),
            next_seq: AtomicU64::new(0),
            applied_seq: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskOutcome {
    pub risk: f32,
    pub transition: Transition,
}

pub struct RiskStateMachine {
    store: Arc<dyn KvStore>,
    sink: Arc<dyn RuleSink>,
    io_timeout: Duration,
    slots: Mutex<HashMap<String, Arc<DomainSlot>>>,
}

impl RiskStateMachine {
    pub fn new(store: Arc<dyn KvStore>, sink: Arc<dyn RuleSink>, io_timeout: Duration) -> Self {
        Self {
            store,
            sink,
            io_timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, domain: &str) -> Arc<DomainSlot> {
        self.slots
            .lock()
            .expect("slot lock")
            .entry(domain.to_string())
            .or_default()
            .clone()
    }

    /// Sequence number for a newly arrived event; assigned before any await
    /// point so in-flight events for the same domain stay ordered.
    pub fn next_seq(&self, domain: &str) -> u64 {
        self.slot(domain).next_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn read_state(&self, domain: &str) -> Result<DomainRiskState> {
        let key = keys::domain_state(domain);
        let state = timeout(self.io_timeout, get_json(self.store.as_ref(), &key))
            .await
            .map_err(|_| EngineError::Persistence(format!("read {key} timed out")))??;
        Ok(state.unwrap_or_default())
    }

    async fn write_state(&self, domain: &str, state: &DomainRiskState) -> Result<()> {
        let key = keys::domain_state(domain);
        timeout(self.io_timeout, put_json(self.store.as_ref(), &key, state))
            .await
            .map_err(|_| EngineError::Persistence(format!("write {key} timed out")))?
    }

    /// Fold one probability observation into the domain's risk and apply any
    /// escalation or de-escalation it demands.
    pub async fn observe(
        &self,
        domain: &str,
        probability: f32,
        mode: EnforcementMode,
        seq: u64,
    ) -> Result<RiskOutcome> {
        let slot = self.slot(domain);
        let _guard = slot.lock.lock().await;

        if seq <= slot.applied_seq.load(Ordering::Acquire) {
            let state = self.read_state(domain).await?;
            tracing::debug!(domain, seq, "stale observation discarded");
            return Ok(RiskOutcome {
                risk: state.risk,
                transition: Transition::Stale,
            });
        }

        let mut state = self.read_state(domain).await?;
        let new_risk = accumulate(state.risk, probability);
        let threshold = mode.thresholds().domain_escalation;
        let transition = transition_for(new_risk, threshold, state.rule_handle.is_some());

        match transition {
            Transition::Escalated => {
                let handle = timeout(
                    self.io_timeout,
                    self.sink.create_rule(
                        MatchSpec::DomainPattern(domain.to_string()),
                        RuleScope::Domain,
                    ),
                )
                .await
                .map_err(|_| EngineError::Sink("create_rule timed out".into()))??;
                state.rule_handle = Some(handle);
            }
            Transition::Deescalated => {
                if let Some(handle) = state.rule_handle.take() {
                    timeout(self.io_timeout, self.sink.remove_rule(handle))
                        .await
                        .map_err(|_| EngineError::Sink("remove_rule timed out".into()))??;
                }
            }
            Transition::None | Transition::Stale => {}
        }

        state.risk = new_risk;
        state.mode = mode;
        state.seq = seq;

        if let Err(e) = self.write_state(domain, &state).await {
            // Roll the rule back so persisted state and installed rules
            // cannot drift apart.
            if transition == Transition::Escalated {
                if let Some(handle) = state.rule_handle {
                    if self.sink.remove_rule(handle).await.is_err() {
                        tracing::warn!(
                            domain,
                            id = handle.id,
                            "rollback of escalation rule failed"
                        );
                    }
                }
            }
            return Err(e);
        }

        slot.applied_seq.store(seq, Ordering::Release);
        Ok(RiskOutcome {
            risk: new_risk,
            transition,
        })
    }

    /// Operator allow-list: drop any engine-issued rule for the domain.
    /// Returns true when a rule was actually removed.
    pub async fn clear_domain(&self, domain: &str) -> Result<bool> {
        let slot = self.slot(domain);
        let _guard = slot.lock.lock().await;

        let mut state = self.read_state(domain).await?;
        let Some(handle) = state.rule_handle.take() else {
            return Ok(false);
        };
        timeout(self.io_timeout, self.sink.remove_rule(handle))
            .await
            .map_err(|_| EngineError::Sink("remove_rule timed out".into()))??;
        self.write_state(domain, &state).await?;
        Ok(true)
    }

    /// Operator block-list: make sure a domain-level rule is installed.
    /// Returns true when a new rule was created.
    pub async fn force_block(&self, domain: &str) -> Result<bool> {
        let slot = self.slot(domain);
        let _guard = slot.lock.lock().await;

        let mut state = self.read_state(domain).await?;
        if state.rule_handle.is_some() {
            return Ok(false);
        }
        let handle = timeout(
            self.io_timeout,
            self.sink.create_rule(
                MatchSpec::DomainPattern(domain.to_string()),
                RuleScope::Domain,
            ),
        )
        .await
        .map_err(|_| EngineError::Sink("create_rule timed out".into()))??;
        state.rule_handle = Some(handle);
        self.write_state(domain, &state).await?;
        Ok(true)
    }

    pub async fn state(&self, domain: &str) -> Result<DomainRiskState> {
        self.read_state(domain).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::storage::MemoryStore;

    fn machine() -> (Arc<MemoryStore>, Arc<MemorySink>, RiskStateMachine) {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new());
        let m = RiskStateMachine::new(store.clone(), sink.clone(), Duration::from_secs(5));
        (store, sink, m)
    }

    #[tokio::test]
    async fn risk_sequence_escalates_on_second_observation() {
        let (_, sink, m) = machine();
        let mode = EnforcementMode::Balanced; // domain threshold 0.55

        let seq = m.next_seq("evil.example");
        let o1 = m.observe("evil.example", 0.6, mode, seq).await.unwrap();
        assert!((o1.risk - 0.30).abs() < 1e-6);
        assert_eq!(o1.transition, Transition::None);

        let seq = m.next_seq("evil.example");
        let o2 = m.observe("evil.example", 0.6, mode, seq).await.unwrap();
        assert!((o2.risk - 0.57).abs() < 1e-6);
        assert_eq!(o2.transition, Transition::Escalated);
        assert_eq!(sink.rule_count(), 1);

        // Remains escalated, still exactly one rule.
        let seq = m.next_seq("evil.example");
        let o3 = m.observe("evil.example", 0.6, mode, seq).await.unwrap();
        assert_eq!(o3.transition, Transition::None);
        assert_eq!(sink.rule_count(), 1);
    }

    #[tokio::test]
    async fn deescalates_after_decay_below_band() {
        let (_, sink, m) = machine();
        let mode = EnforcementMode::Balanced;

        for _ in 0..3 {
            let seq = m.next_seq("d.example");
            m.observe("d.example", 0.9, mode, seq).await.unwrap();
        }
        assert_eq!(sink.rule_count(), 1);

        // Quiet observations decay risk toward the release band
        // (0.55 * 0.4 = 0.22).
        let mut last = RiskOutcome {
            risk: 1.0,
            transition: Transition::None,
        };
        for _ in 0..20 {
            let seq = m.next_seq("d.example");
            last = m.observe("d.example", 0.0, mode, seq).await.unwrap();
            if last.transition == Transition::Deescalated {
                break;
            }
        }
        assert_eq!(last.transition, Transition::Deescalated);
        assert!(last.risk < 0.55 * 0.4);
        assert_eq!(sink.rule_count(), 0);
    }

    #[tokio::test]
    async fn stale_sequence_is_discarded() {
        let (_, _, m) = machine();
        let mode = EnforcementMode::Balanced;

        let old_seq = m.next_seq("s.example");
        let new_seq = m.next_seq("s.example");
        m.observe("s.example", 0.6, mode, new_seq).await.unwrap();

        let out = m.observe("s.example", 0.9, mode, old_seq).await.unwrap();
        assert_eq!(out.transition, Transition::Stale);
        // Risk still reflects only the applied observation.
        assert!((out.risk - 0.30).abs() < 1e-6);
    }

    #[tokio::test]
    async fn force_block_and_clear_round_trip() {
        let (_, sink, m) = machine();
        assert!(m.force_block("manual.example").await.unwrap());
        assert!(!m.force_block("manual.example").await.unwrap());
        assert_eq!(sink.rule_count(), 1);

        assert!(m.clear_domain("manual.example").await.unwrap());
        assert!(!m.clear_domain("manual.example").await.unwrap());
        assert_eq!(sink.rule_count(), 0);
    }

    #[tokio::test]
    async fn sink_failure_leaves_state_unchanged() {
        struct FailingSink;

        #[async_trait::async_trait]
        impl RuleSink for FailingSink {
            async fn create_rule(
                &self,
                _spec: MatchSpec,
                _scope: RuleScope,
            ) -> Result<crate::sink::RuleHandle> {
                Err(EngineError::Sink("injected".into()))
            }
            async fn remove_rule(&self, _handle: crate::sink::RuleHandle) -> Result<()> {
                Err(EngineError::Sink("injected".into()))
            }
            async fn list_active_rule_ids(
                &self,
            ) -> Result<std::collections::BTreeSet<crate::sink::RuleId>> {
                Ok(Default::default())
            }
        }

        let store = Arc::new(MemoryStore::new());
        let m = RiskStateMachine::new(store, Arc::new(FailingSink), Duration::from_secs(5));
        let mode = EnforcementMode::Strict; // domain threshold 0.35

        let seq = m.next_seq("f.example");
        let err = m.observe("f.example", 1.0, mode, seq).await.unwrap_err();
        assert!(matches!(err, EngineError::Sink(_)));

        // Nothing was persisted for the failed update.
        let state = m.state("f.example").await.unwrap();
        assert_eq!(state.risk, 0.0);
        assert!(state.rule_handle.is_none());
    }

    #[tokio::test]
    async fn concurrent_same_domain_updates_apply_in_order() {
        let (_, _, m) = machine();
        let m = Arc::new(m);
        let mode = EnforcementMode::Monitor; // high threshold, no transitions

        let mut handles = Vec::new();
        for _ in 0..10 {
            let m = m.clone();
            let seq = m.next_seq("c.example");
            handles.push(tokio::spawn(async move {
                m.observe("c.example", 0.5, mode, seq).await.unwrap()
            }));
        }
        let mut applied = 0;
        for h in handles {
            if h.await.unwrap().transition != Transition::Stale {
                applied += 1;
            }
        }

        // The newest observation (seq 10) can never be discarded as stale,
        // and every applied update folds in a full read-modify-write, so the
        // final record carries the newest sequence and at least one update.
        let state = m.state("c.example").await.unwrap();
        assert_eq!(state.seq, 10);
        assert!(applied >= 1);
        assert!((0.25..=1.0).contains(&state.risk), "risk {}", state.risk);
    }
}
