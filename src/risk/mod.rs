//! Per-domain risk accumulation and escalation.

mod engine;

pub use engine::{RiskOutcome, RiskStateMachine};

use crate::policy::EnforcementMode;
use crate::sink::RuleHandle;
use serde::{Deserialize, Serialize};

/// Multiplicative decay applied to the previous risk on every observation.
pub const RISK_DECAY: f32 = 0.9;
/// Weight of the incoming probability.
pub const RISK_GAIN: f32 = 0.5;
/// De-escalation fires below `threshold * HYSTERESIS_FACTOR`, keeping a band
/// between the two transitions so risk hovering near the threshold cannot
/// flap the rule.
pub const HYSTERESIS_FACTOR: f32 = 0.4;

/// Persisted risk record for one domain.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DomainRiskState {
    pub risk: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_handle: Option<RuleHandle>,
    #[serde(default)]
    pub mode: EnforcementMode,
    /// Monotonic per-domain sequence of the last applied update.
    #[serde(default)]
    pub seq: u64,
}

/// Asymmetric exponential smoothing: one high-probability observation can
/// push risk up quickly, while quiet periods decay it 10% per observation.
/// Decay is observation-driven, not wall-clock-driven.
pub fn accumulate(prev_risk: f32, probability: f32) -> f32 {
    (prev_risk * RISK_DECAY + probability * RISK_GAIN).min(1.0).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No rule change.
    None,
    /// Clear → Escalated: a domain-level rule was installed.
    Escalated,
    /// Escalated → Clear: the rule was removed.
    Deescalated,
    /// Update discarded: a newer observation was already applied.
    Stale,
}

/// Which transition a freshly accumulated risk value demands, given the
/// domain-escalation threshold and whether a rule is currently active.
pub fn transition_for(new_risk: f32, threshold: f32, rule_active: bool) -> Transition {
    if new_risk > threshold && !rule_active {
        Transition::Escalated
    } else if new_risk < threshold * HYSTERESIS_FACTOR && rule_active {
        Transition::Deescalated
    } else {
        Transition::None
    }
}
