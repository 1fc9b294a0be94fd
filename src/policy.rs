//! Enforcement modes and their threshold table.

use serde::{Deserialize, Serialize};

/// Operator-selected enforcement mode. One reconciled vocabulary: `Strict`
/// blocks and escalates most aggressively, `Monitor` observes only — its
/// request threshold sits above any reachable probability, so per-request
/// blocking can never trigger, while risk accumulation continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    Strict,
    #[default]
    Balanced,
    Monitor,
}

/// Numeric thresholds resolved from a mode: one for per-request blocking,
/// one for domain-level escalation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub request_block: f32,
    pub domain_escalation: f32,
}

impl EnforcementMode {
    pub fn thresholds(self) -> Thresholds {
        match self {
            EnforcementMode::Strict => Thresholds {
                request_block: 0.70,
                domain_escalation: 0.35,
            },
            EnforcementMode::Balanced => Thresholds {
                request_block: 0.88,
                domain_escalation: 0.55,
            },
            EnforcementMode::Monitor => Thresholds {
                request_block: 1.10,
                domain_escalation: 0.75,
            },
        }
    }

    pub fn is_monitor(self) -> bool {
        self == EnforcementMode::Monitor
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnforcementMode::Strict => "strict",
            EnforcementMode::Balanced => "balanced",
            EnforcementMode::Monitor => "monitor",
        }
    }
}
