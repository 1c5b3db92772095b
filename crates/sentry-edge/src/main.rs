//! Sentry edge node: tails Zeek logs, correlates them into enriched
//! flow events, scores them with a streaming ensemble autoencoder,
//! watches Zeek notices directly, and escalates alerts to the center.
//! Grounded on `sx9-gateway-primary::main.rs`'s `clap` + tracing
//! bootstrap and `network_monitor.py`'s tail-loop cadence.

mod config;
mod correlator;
mod detector;
mod error;
mod escalator;
mod features;
mod log_reader;
mod notice_monitor;
mod record;
mod server;
mod state;

use clap::Parser;
use sentry_core::Severity;
use tracing::info;

use crate::config::{Args, SentryConfig};
use crate::detector::{EnsembleDetector, Phase};
use crate::escalator::score_to_alert;
use crate::log_reader::{discover_log_dir, LogReader, ERROR_BACKOFF, POLL_INTERVAL};
use crate::record::LogRecord;
use crate::state::SharedState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("sentry_edge=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = SentryConfig::from_env().with_args(&args);

    let log_dir = config
        .log_dir_override
        .clone()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(discover_log_dir);
    info!(path = %log_dir.display(), "watching Zeek log directory");

    let state = SharedState::new(config.oracle_url.clone());

    let server_state = state.clone();
    let server_port = config.port;
    tokio::spawn(async move {
        if let Err(err) = server::serve(server_port, server_state).await {
            tracing::error!(%err, "edge HTTP server exited");
        }
    });

    run_ingestion_loop(config, log_dir, state).await
}

/// Owns the Log Reader, Correlator, and Ensemble Detector — all
/// single-owner state driven from this one task (§9: "global mutable
/// state" → owning task).
async fn run_ingestion_loop(
    config: SentryConfig,
    log_dir: std::path::PathBuf,
    state: SharedState,
) -> anyhow::Result<()> {
    let mut reader = LogReader::new(log_dir);
    let mut correlator = correlator::Correlator::new(config.correlator_cap);
    let mut detector = EnsembleDetector::new(
        config.model_path.clone(),
        config.detector_max_training_samples,
        config.detector_threshold,
    );

    let mut ticks_since_retry: u64 = 0;

    loop {
        let (records, had_error) = reader.poll_once();
        if !records.is_empty() {
            process_records(records, &mut correlator, &mut detector, &state).await;
        }

        ticks_since_retry += 1;
        if ticks_since_retry >= 20 {
            ticks_since_retry = 0;
            let mut escalator = state.escalator.lock().await;
            escalator.drain_retries().await;
        }

        tokio::time::sleep(if had_error { ERROR_BACKOFF } else { POLL_INTERVAL }).await;
    }
}

async fn process_records(
    records: Vec<LogRecord>,
    correlator: &mut correlator::Correlator,
    detector: &mut EnsembleDetector,
    state: &SharedState,
) {
    for record in records {
        if let LogRecord::Notice(notice) = &record {
            let mut alert = notice_monitor::notice_to_alert(notice);
            {
                let mut inner = state.inner.write().await;
                alert.id = inner.allocate_id();
                inner.push_notice(alert.clone());
                inner.push_alert(alert.clone());
            }
            if matches!(alert.severity, Severity::Critical | Severity::High) {
                let mut escalator = state.escalator.lock().await;
                escalator.escalate(alert).await;
            }
        }

        if let Some(event) = correlator.ingest(record) {
            let feature_vec = features::extract_features(&event);
            let score = detector.process(&feature_vec);

            {
                let mut inner = state.inner.write().await;
                inner.local_stats.anomaly_score = score;
            }

            if matches!(detector.phase(), Phase::Detect) && score >= detector.threshold() {
                let mut alert = score_to_alert(score, &event.src_ip, &event.dest_ip);
                {
                    let mut inner = state.inner.write().await;
                    alert.id = inner.allocate_id();
                    inner.push_alert(alert.clone());
                    inner.local_stats.escalations += 1;
                }
                let mut escalator = state.escalator.lock().await;
                escalator.escalate(alert).await;
            }
        }
    }
}
