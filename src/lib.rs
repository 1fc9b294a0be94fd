//! ZTFW Engine — Adaptive per-domain network-request risk engine.
//!
//! For every observed request the engine derives a feature vector, scores it
//! with a small fixed feed-forward network, folds the score into a persistent
//! per-domain risk accumulator, and escalates or de-escalates the domain
//! through an external rule sink, subject to the operator's enforcement mode.
//!
//! Modular structure:
//! - [`events`] — Request events and URL decomposition
//! - [`features`] — Rolling windows and feature extraction
//! - [`model`] — Weights, normalization, forward-pass inference
//! - [`fastpath`] — Heuristic immediate-block filter
//! - [`policy`] — Enforcement modes and threshold table
//! - [`risk`] — Per-domain risk state machine
//! - [`sink`] / [`storage`] — External collaborators behind traits
//! - [`audit`] — Bounded decision audit log
//! - [`engine`] — Per-event decision orchestrator
//! - [`logging`] — Structured JSON logging

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fastpath;
pub mod features;
pub mod logging;
pub mod model;
pub mod policy;
pub mod risk;
pub mod sink;
pub mod storage;
pub mod telemetry;

pub use audit::{AuditEntry, AuditLog, AUDIT_CAPACITY};
pub use config::{EngineConfig, RuntimeSettings};
pub use engine::{Decision, DecisionEngine, Verdict};
pub use error::{EngineError, Result};
pub use events::{parse_url, RequestEvent};
pub use features::{FeatureExtractor, FeatureVector, FEATURE_DIM};
pub use model::{Detector, ModelWeights, Scaler};
pub use policy::EnforcementMode;
pub use risk::{DomainRiskState, RiskStateMachine};
pub use sink::{MatchSpec, MemorySink, RuleHandle, RuleScope, RuleSink};
pub use storage::{KvStore, MemoryStore, SqliteStore};
pub use telemetry::TelemetryFeed;
