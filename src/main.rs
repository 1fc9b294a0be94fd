//! ZTFW engine entrypoint: long-running daemon fed newline-delimited JSON
//! messages on stdin by the host collaborator. Each decision is emitted as a
//! structured JSON line; Ctrl+C stops the loop.

use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};
use ztfw_engine::{
    config::EngineConfig,
    engine::DecisionEngine,
    events::RequestEvent,
    logging::{LogEvent, StructuredLogger},
    model::Detector,
    sink::MemorySink,
    storage::SqliteStore,
    RuntimeSettings,
};

/// Host messages, one JSON object per stdin line.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostMessage {
    Request(RequestEvent),
    Telemetry { deviation: f32 },
    Settings(RuntimeSettings),
}

async fn handle_request(engine: &DecisionEngine, event: RequestEvent) {
    let ts = chrono::Utc::now().to_rfc3339();
    let mut stdout = std::io::stdout().lock();
    match engine.handle_event(&event).await {
        Ok(decision) => {
            let line = LogEvent {
                ts,
                level: "info",
                message: "decision",
                event_id: Some(&event.id),
                domain: decision.domain.as_deref(),
                probability: decision.probability,
                risk: decision.risk,
                mode: Some(decision.mode.as_str()),
                verdict: Some(decision.verdict.as_str()),
                error: None,
            };
            StructuredLogger::emit_json(&line, &mut stdout);
        }
        Err(e) => {
            let error = e.to_string();
            let line = LogEvent {
                ts,
                level: "warn",
                message: "event skipped",
                event_id: Some(&event.id),
                domain: None,
                probability: None,
                risk: None,
                mode: None,
                verdict: None,
                error: Some(&error),
            };
            StructuredLogger::emit_json(&line, &mut stdout);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("ZTFW_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = EngineConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(data_dir = ?config.data_dir, "ZTFW engine starting");

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(SqliteStore::open(&config.data_dir.join("store.db"))?);
    let sink = Arc::new(MemorySink::new());
    let detector = Arc::new(Detector::new(config.model_path.clone()));
    let (settings_tx, settings_rx) = watch::channel(config.settings.clone());

    let engine = DecisionEngine::new(&config, store, sink, detector, settings_rx);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ZTFW engine stopping");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("event source closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<HostMessage>(&line) {
                    Ok(HostMessage::Request(event)) => handle_request(&engine, event).await,
                    Ok(HostMessage::Telemetry { deviation }) => {
                        engine.telemetry().publish(deviation);
                    }
                    Ok(HostMessage::Settings(settings)) => {
                        info!(mode = settings.mode.as_str(), enabled = settings.enabled, "settings updated");
                        settings_tx.send_replace(settings);
                    }
                    Err(e) => warn!(error = %e, "unparsable host message"),
                }
            }
        }
    }

    Ok(())
}
