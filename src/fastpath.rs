//! Fast-path heuristic filter.
//!
//! Evaluated on the raw (pre-scaling) feature vector for every event,
//! independently of the network; an immediate-block verdict overrides the
//! probability-based decision and still applies when inference fails.

use crate::features::FeatureVector;

/// In-window request count that looks beacon-like.
pub const BEACON_FREQUENCY_MIN: f32 = 45.0;
/// Domain-heuristic score at the third-party shortener level.
pub const BEACON_DOMAIN_RISK_MIN: f32 = 4.0;
/// Request-body size treated as a POST anomaly.
pub const POST_PACKET_SIZE_MIN: f32 = 8192.0;
/// Behavioral deviation treated as anomalous.
pub const POST_DEVIATION_MIN: f32 = 0.8;

pub const REASON_BEACON: &str = "Beacon exfiltration pattern";
pub const REASON_POST_ANOMALY: &str = "High POST anomaly";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPathVerdict {
    Pass,
    ImmediateBlock { reason: &'static str },
}

/// Pure function over the extractor's feature ordering.
pub fn evaluate(fv: &FeatureVector) -> FastPathVerdict {
    if fv.frequency() >= BEACON_FREQUENCY_MIN && fv.domain_risk() >= BEACON_DOMAIN_RISK_MIN {
        return FastPathVerdict::ImmediateBlock {
            reason: REASON_BEACON,
        };
    }

    if fv.packet_size() >= POST_PACKET_SIZE_MIN
        && fv.behavior_deviation() >= POST_DEVIATION_MIN
    {
        return FastPathVerdict::ImmediateBlock {
            reason: REASON_POST_ANOMALY,
        };
    }

    FastPathVerdict::Pass
}
