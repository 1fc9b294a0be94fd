//! Error types for the risk engine. No variant is fatal to the process:
//! each failure is scoped to the event that triggered it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed URL — the event is skipped, no window or risk state mutated.
    #[error("malformed url {url:?}: {reason}")]
    Parse { url: String, reason: &'static str },

    /// Model weights unavailable or unparsable — scoring skipped for this
    /// call only; the enforcement policy decides fail-open vs fail-closed.
    #[error("model resource unavailable: {0}")]
    Resource(String),

    /// Persistence read/write failure — the event is skipped without
    /// partially applied state transitions.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Rule sink create/remove failure — risk state is left unchanged so it
    /// cannot drift from the rules actually installed.
    #[error("rule sink failure: {0}")]
    Sink(String),

    /// Invalid engine configuration (e.g. scaler dimensions).
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn parse(url: impl Into<String>, reason: &'static str) -> Self {
        Self::Parse {
            url: url.into(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
