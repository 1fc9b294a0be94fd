//! End-to-end scenarios: event in, rule and audit trail out.

use std::sync::Arc;
use tokio::sync::watch;
use ztfw_engine::{
    audit::kind,
    config::{EngineConfig, RuntimeSettings},
    engine::{DecisionEngine, Verdict},
    events::RequestEvent,
    model::{Detector, ModelWeights, LAYER_DIMS},
    policy::EnforcementMode,
    sink::{MemorySink, RuleScope},
    storage::{MemoryStore, SqliteStore},
    risk::{RiskStateMachine, Transition},
};

/// All-zero weights with layer-2 bias = logit(p): the network outputs a
/// constant probability regardless of input.
fn constant_detector(p: f32) -> Detector {
    let logit = (p / (1.0 - p)).ln();
    let weights = ModelWeights {
        layer_0_weights: vec![vec![0.0; LAYER_DIMS[1]]; LAYER_DIMS[0]],
        layer_0_bias: vec![0.0; LAYER_DIMS[1]],
        layer_1_weights: vec![vec![0.0; LAYER_DIMS[2]]; LAYER_DIMS[1]],
        layer_1_bias: vec![0.0; LAYER_DIMS[2]],
        layer_2_weights: vec![vec![0.0; LAYER_DIMS[3]]; LAYER_DIMS[2]],
        layer_2_bias: vec![logit],
    };
    Detector::with_weights(weights).unwrap()
}

fn engine_with(
    detector: Detector,
    settings: RuntimeSettings,
) -> (DecisionEngine, Arc<MemorySink>, watch::Sender<RuntimeSettings>) {
    let config = EngineConfig::default();
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    let (tx, rx) = watch::channel(settings);
    let engine = DecisionEngine::new(&config, store, sink.clone(), Arc::new(detector), rx);
    (engine, sink, tx)
}

#[tokio::test]
async fn balanced_mode_blocks_and_audits_high_probability_request() {
    // Balanced request threshold is 0.88; a constant 0.92 model must
    // request-block and record BLOCK_REQUEST_AI with domain and probability.
    let (engine, sink, _tx) = engine_with(constant_detector(0.92), RuntimeSettings::default());

    let decision = engine
        .handle_event(&RequestEvent::new("https://exfil.example/upload"))
        .await
        .unwrap();

    assert_eq!(decision.verdict, Verdict::Blocked);
    assert_eq!(decision.domain.as_deref(), Some("exfil.example"));
    assert!(decision.probability.unwrap() > 0.88);

    let rules = sink.active_rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].2, RuleScope::Request);

    let entries = engine.audit().entries().await.unwrap();
    let entry = entries
        .iter()
        .find(|e| e.kind == kind::BLOCK_REQUEST_AI)
        .expect("audit entry");
    assert_eq!(entry.domain, "exfil.example");
    assert!((entry.probability.unwrap() - 0.92).abs() < 1e-4);
}

#[tokio::test]
async fn risk_sequence_escalates_on_second_observation_and_stays() {
    // [0, 0.6, 0.6, 0.6] at threshold 0.55: 0.30, then 0.57 > 0.55
    // (escalate), then no further transition and exactly one rule.
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    let machine = RiskStateMachine::new(
        store,
        sink.clone(),
        std::time::Duration::from_secs(5),
    );
    let mode = EnforcementMode::Balanced;

    let seq = machine.next_seq("tracker.example");
    let o1 = machine.observe("tracker.example", 0.6, mode, seq).await.unwrap();
    assert!((o1.risk - 0.30).abs() < 1e-6);
    assert_eq!(o1.transition, Transition::None);
    assert_eq!(sink.rule_count(), 0);

    let seq = machine.next_seq("tracker.example");
    let o2 = machine.observe("tracker.example", 0.6, mode, seq).await.unwrap();
    assert!((o2.risk - 0.57).abs() < 1e-6);
    assert_eq!(o2.transition, Transition::Escalated);
    assert_eq!(sink.rule_count(), 1);

    let seq = machine.next_seq("tracker.example");
    let o3 = machine.observe("tracker.example", 0.6, mode, seq).await.unwrap();
    assert_eq!(o3.transition, Transition::None);
    assert_eq!(sink.rule_count(), 1);
    assert_eq!(
        sink.active_rules()[0].1.url_filter(),
        "||tracker.example^"
    );
}

#[tokio::test]
async fn repeated_high_risk_traffic_escalates_the_domain() {
    // Constant 0.6 stays below the balanced request threshold, so individual
    // requests pass while accumulated risk crosses 0.55 and installs a
    // domain rule with a zero-trust audit entry.
    let (engine, sink, _tx) = engine_with(constant_detector(0.6), RuntimeSettings::default());

    let d1 = engine
        .handle_event(&RequestEvent::new("https://tracker.example/a"))
        .await
        .unwrap();
    assert_eq!(d1.verdict, Verdict::Pass);
    assert_eq!(sink.rule_count(), 0);

    let d2 = engine
        .handle_event(&RequestEvent::new("https://tracker.example/b"))
        .await
        .unwrap();
    assert_eq!(d2.verdict, Verdict::Pass);
    assert!((d2.risk.unwrap() - 0.57).abs() < 1e-6);
    assert_eq!(sink.rule_count(), 1);

    let entries = engine.audit().entries().await.unwrap();
    assert_eq!(entries[0].kind, kind::BLOCK_DOMAIN_ZERO_TRUST);
    assert_eq!(entries[0].domain, "tracker.example");

    // Global risk indicator follows the latest evaluation.
    assert!((engine.global_risk() - 0.57).abs() < 1e-6);
}

#[tokio::test]
async fn monitor_mode_observes_without_blocking() {
    let mut settings = RuntimeSettings::default();
    settings.mode = EnforcementMode::Monitor;
    let (engine, sink, _tx) = engine_with(constant_detector(0.99), settings);

    for _ in 0..3 {
        let d = engine
            .handle_event(&RequestEvent::new("https://loud.example/"))
            .await
            .unwrap();
        assert_eq!(d.verdict, Verdict::Pass);
    }
    // Risk accumulated past monitor's 0.75 escalation threshold: the
    // domain-level rule still applies, only per-request blocking is off.
    assert_eq!(sink.rule_count(), 1);
    let entries = engine.audit().entries().await.unwrap();
    assert!(entries.iter().all(|e| e.kind != kind::BLOCK_REQUEST_AI));
}

#[tokio::test]
async fn settings_update_is_picked_up_mid_stream() {
    let (engine, sink, tx) = engine_with(constant_detector(0.92), RuntimeSettings::default());

    let d = engine
        .handle_event(&RequestEvent::new("https://evil.example/"))
        .await
        .unwrap();
    assert_eq!(d.verdict, Verdict::Blocked);
    assert_eq!(sink.rule_count(), 1);

    tx.send_modify(|s| s.enabled = false);
    let d = engine
        .handle_event(&RequestEvent::new("https://evil.example/"))
        .await
        .unwrap();
    assert_eq!(d.verdict, Verdict::Skipped);
    assert_eq!(sink.rule_count(), 1);
}

#[tokio::test]
async fn sqlite_backed_engine_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default();
    let store = Arc::new(SqliteStore::open(&dir.path().join("store.db")).unwrap());
    let sink = Arc::new(MemorySink::new());
    let (_tx, rx) = watch::channel(RuntimeSettings::default());
    let engine = DecisionEngine::new(
        &config,
        store,
        sink.clone(),
        Arc::new(constant_detector(0.92)),
        rx,
    );

    let d = engine
        .handle_event(&RequestEvent::new("https://exfil.example/"))
        .await
        .unwrap();
    assert_eq!(d.verdict, Verdict::Blocked);

    let entries = engine.audit().entries().await.unwrap();
    assert_eq!(entries[0].kind, kind::BLOCK_REQUEST_AI);

    let state = engine.risk().state("exfil.example").await.unwrap();
    assert!((state.risk - 0.46).abs() < 1e-6);
}
