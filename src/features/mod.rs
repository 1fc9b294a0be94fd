//! Per-request feature derivation: rolling windows → numeric vector.

mod extractor;
mod window;

pub use extractor::{shannon_entropy, FeatureExtractor};
pub use window::{RollingWindows, WINDOW_MS};

use serde::{Deserialize, Serialize};

/// Number of features fed to the model's input layer.
pub const FEATURE_DIM: usize = 6;

/// Feature vector ordering. The fast-path filter and the scaler both index
/// by these positions.
pub mod idx {
    /// Byte length of the serialized request body (0 when absent).
    pub const PACKET_SIZE: usize = 0;
    /// Requests for this domain in the trailing window, current one included.
    pub const FREQUENCY: usize = 1;
    /// Shannon entropy (base 2) of the URL string.
    pub const ENTROPY: usize = 2;
    /// Static domain heuristic (scheme + shortener substrings).
    pub const DOMAIN_RISK: usize = 3;
    /// Latest behavioral-deviation scalar from the telemetry feed.
    pub const BEHAVIOR_DEVIATION: usize = 4;
    /// Placeholder slot, always 0.
    pub const RESERVED: usize = 5;
}

/// Fixed-size feature vector for one request event. Ephemeral: created per
/// event and consumed by the fast-path filter and the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: [f32; FEATURE_DIM],
    pub domain: String,
    pub event_id: String,
    pub ts: i64,
}

impl FeatureVector {
    pub fn packet_size(&self) -> f32 {
        self.values[idx::PACKET_SIZE]
    }

    pub fn frequency(&self) -> f32 {
        self.values[idx::FREQUENCY]
    }

    pub fn entropy(&self) -> f32 {
        self.values[idx::ENTROPY]
    }

    pub fn domain_risk(&self) -> f32 {
        self.values[idx::DOMAIN_RISK]
    }

    pub fn behavior_deviation(&self) -> f32 {
        self.values[idx::BEHAVIOR_DEVIATION]
    }
}
