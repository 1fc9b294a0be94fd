//! Behavioral telemetry feed: latest-value semantics, no queue.

use tokio::sync::watch;

/// Deviation assumed until the first sample arrives.
pub const DEFAULT_BEHAVIOR_DEVIATION: f32 = 0.2;

/// Latest behavioral-deviation scalar in [0, 1], published periodically by
/// the content-observation collaborator.
pub struct TelemetryFeed {
    tx: watch::Sender<f32>,
}

impl Default for TelemetryFeed {
    fn default() -> Self {
        Self {
            tx: watch::channel(DEFAULT_BEHAVIOR_DEVIATION).0,
        }
    }
}

impl TelemetryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, deviation: f32) {
        self.tx.send_replace(deviation.clamp(0.0, 1.0));
    }

    pub fn latest(&self) -> f32 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.tx.subscribe()
    }
}
