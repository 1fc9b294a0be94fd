//! Decision orchestrator: per-event pipeline from URL to verdict.
//!
//! The engine owns the in-process collaborators (extractor, scaler, detector,
//! risk machine, audit log, telemetry feed) and externalizes side effects to
//! the rule sink and the store. It holds no long-lived decision state of its
//! own; mode and toggles arrive through a watch subscription and are read
//! fresh per event.

use crate::audit::{kind, AuditEntry, AuditLog};
use crate::config::{EngineConfig, RuntimeSettings};
use crate::error::{EngineError, Result};
use crate::events::{is_web_url, parse_url, RequestEvent};
use crate::fastpath::{self, FastPathVerdict};
use crate::features::FeatureExtractor;
use crate::model::{Detector, Scaler};
use crate::policy::EnforcementMode;
use crate::risk::{RiskStateMachine, Transition};
use crate::sink::{MatchSpec, RuleScope, RuleSink};
use crate::storage::{keys, put_json, KvStore};
use crate::telemetry::TelemetryFeed;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

/// Outcome category for one processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Engine disabled or non-web scheme; nothing evaluated.
    Skipped,
    /// Domain is on the manual allow-list.
    AllowListed,
    /// Domain is on the manual block-list.
    BlockListed,
    /// Evaluated, request allowed through.
    Pass,
    /// Request-scoped block installed.
    Blocked,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Skipped => "skipped",
            Verdict::AllowListed => "allow_listed",
            Verdict::BlockListed => "block_listed",
            Verdict::Pass => "pass",
            Verdict::Blocked => "blocked",
        }
    }
}

/// Full decision record for one event, suitable for structured logging.
#[derive(Debug, Clone)]
pub struct Decision {
    pub event_id: String,
    pub domain: Option<String>,
    pub mode: EnforcementMode,
    pub verdict: Verdict,
    pub probability: Option<f32>,
    pub risk: Option<f32>,
    pub reason: Option<&'static str>,
}

impl Decision {
    fn skipped(event: &RequestEvent, mode: EnforcementMode) -> Self {
        Self {
            event_id: event.id.clone(),
            domain: None,
            mode,
            verdict: Verdict::Skipped,
            probability: None,
            risk: None,
            reason: None,
        }
    }
}

pub struct DecisionEngine {
    settings: watch::Receiver<RuntimeSettings>,
    extractor: FeatureExtractor,
    scaler: Scaler,
    detector: Arc<Detector>,
    risk: RiskStateMachine,
    audit: AuditLog,
    telemetry: TelemetryFeed,
    sink: Arc<dyn RuleSink>,
    store: Arc<dyn KvStore>,
    io_timeout: Duration,
    global_risk: watch::Sender<f32>,
}

impl DecisionEngine {
    pub fn new(
        config: &EngineConfig,
        store: Arc<dyn KvStore>,
        sink: Arc<dyn RuleSink>,
        detector: Arc<Detector>,
        settings: watch::Receiver<RuntimeSettings>,
    ) -> Self {
        Self {
            settings,
            extractor: FeatureExtractor::new(
                config.features.window_ms,
                config.features.max_domains,
            ),
            scaler: Scaler::default(),
            detector,
            risk: RiskStateMachine::new(store.clone(), sink.clone(), config.io_timeout()),
            audit: AuditLog::new(store.clone()),
            telemetry: TelemetryFeed::new(),
            sink,
            store,
            io_timeout: config.io_timeout(),
            global_risk: watch::channel(0.0).0,
        }
    }

    pub fn telemetry(&self) -> &TelemetryFeed {
        &self.telemetry
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn risk(&self) -> &RiskStateMachine {
        &self.risk
    }

    /// Latest published global risk indicator.
    pub fn global_risk(&self) -> f32 {
        *self.global_risk.borrow()
    }

    pub fn subscribe_global_risk(&self) -> watch::Receiver<f32> {
        self.global_risk.subscribe()
    }

    /// Process one request event end to end.
    ///
    /// A returned error means the event was skipped without partial state
    /// mutation; the caller logs it and moves on.
    pub async fn handle_event(&self, event: &RequestEvent) -> Result<Decision> {
        let settings = self.settings.borrow().clone();
        let mode = settings.mode;

        if !settings.enabled {
            return Ok(Decision::skipped(event, mode));
        }
        if !is_web_url(&event.url) {
            tracing::debug!(event_id = %event.id, url = %event.url, "non-web scheme skipped");
            return Ok(Decision::skipped(event, mode));
        }

        let parsed = parse_url(&event.url)?;
        let domain = parsed.host.clone();

        if settings.allow_list.iter().any(|d| d == &domain) {
            if self.risk.clear_domain(&domain).await? {
                self.audit
                    .record(AuditEntry::new(kind::UNBLOCK_DOMAIN, &domain, mode))
                    .await?;
            }
            return Ok(Decision {
                event_id: event.id.clone(),
                domain: Some(domain),
                mode,
                verdict: Verdict::AllowListed,
                probability: None,
                risk: None,
                reason: None,
            });
        }
        if settings.block_list.iter().any(|d| d == &domain) {
            if self.risk.force_block(&domain).await? {
                self.audit
                    .record(AuditEntry::new(kind::BLOCK_DOMAIN_MANUAL, &domain, mode))
                    .await?;
            }
            return Ok(Decision {
                event_id: event.id.clone(),
                domain: Some(domain),
                mode,
                verdict: Verdict::BlockListed,
                probability: None,
                risk: None,
                reason: None,
            });
        }

        let fv = self
            .extractor
            .extract(event, &parsed, self.telemetry.latest());
        // Sequence assigned before the first await so in-flight events for
        // the same domain keep their arrival order.
        let seq = self.risk.next_seq(&domain);

        let fast_reason = match fastpath::evaluate(&fv) {
            FastPathVerdict::ImmediateBlock { reason } => Some(reason),
            FastPathVerdict::Pass => None,
        };

        let scaled = self.scaler.apply(&fv.values);
        let probability = match self.detector.predict(&scaled).await {
            Ok(p) => Some(p),
            Err(EngineError::Resource(e)) => {
                tracing::warn!(
                    event_id = %event.id,
                    domain = %domain,
                    mode = mode.as_str(),
                    error = %e,
                    "inference unavailable"
                );
                None
            }
            Err(e) => return Err(e),
        };

        let thresholds = mode.thresholds();
        let model_block = probability
            .is_some_and(|p| p > thresholds.request_block && !mode.is_monitor());
        // Model outage: fail open except in strict mode.
        let fail_closed = probability.is_none() && mode == EnforcementMode::Strict;
        let blocked = fast_reason.is_some() || model_block || fail_closed;

        if blocked {
            timeout(
                self.io_timeout,
                self.sink
                    .create_rule(MatchSpec::ExactUrl(event.url.clone()), RuleScope::Request),
            )
            .await
            .map_err(|_| EngineError::Sink("create_rule timed out".into()))??;

            let entry = match (fast_reason, probability) {
                (Some(reason), _) => {
                    AuditEntry::new(kind::BLOCK_REQUEST_FASTPATH, &domain, mode)
                        .with_reason(reason)
                }
                (None, Some(p)) => {
                    AuditEntry::new(kind::BLOCK_REQUEST_AI, &domain, mode).with_probability(p)
                }
                (None, None) => AuditEntry::new(kind::BLOCK_REQUEST_FAILCLOSED, &domain, mode),
            };
            self.audit.record(entry).await?;
        }

        // Domain risk always folds in the model's probability when one was
        // computed, fast-path hit or not. Only when inference failed does a
        // heuristic hit stand in as a full-confidence observation; with
        // neither there is nothing to fold in.
        let risk_input = match (probability, fast_reason) {
            (Some(p), _) => Some(p),
            (None, Some(_)) => Some(1.0),
            (None, None) => None,
        };

        let mut risk_after = None;
        if let Some(p) = risk_input {
            let outcome = self.risk.observe(&domain, p, mode, seq).await?;
            match outcome.transition {
                Transition::Escalated => {
                    self.audit
                        .record(
                            AuditEntry::new(kind::BLOCK_DOMAIN_ZERO_TRUST, &domain, mode)
                                .with_probability(p),
                        )
                        .await?;
                }
                Transition::Deescalated => {
                    self.audit
                        .record(AuditEntry::new(kind::UNBLOCK_DOMAIN, &domain, mode))
                        .await?;
                }
                Transition::None | Transition::Stale => {}
            }
            if outcome.transition != Transition::Stale {
                risk_after = Some(outcome.risk);
                self.publish_global_risk(outcome.risk).await;
            }
        }

        Ok(Decision {
            event_id: event.id.clone(),
            domain: Some(domain),
            mode,
            verdict: if blocked { Verdict::Blocked } else { Verdict::Pass },
            probability,
            risk: risk_after,
            reason: fast_reason,
        })
    }

    /// Observability indicator: the risk value from the latest applied
    /// evaluation, mirrored to the store on a best-effort basis.
    async fn publish_global_risk(&self, risk: f32) {
        self.global_risk.send_replace(risk);
        let write = timeout(
            self.io_timeout,
            put_json(self.store.as_ref(), keys::GLOBAL_RISK, &risk),
        )
        .await
        .map_err(|_| EngineError::Persistence("write global_risk timed out".into()))
        .and_then(|r| r);
        if let Err(e) = write {
            tracing::warn!(error = %e, "global risk not persisted");
        }
    }
}
