//! Oracle center: ingests alerts from edge nodes, applies abuse
//! safeguards, persists them, and scores/correlates them in the
//! background. Grounded on `sx9-gateway-primary::main.rs`'s `clap` +
//! tracing bootstrap and `oracle_service.py::create_app`'s wiring of
//! `ThreatAnalyzer`/`AlertCorrelator` into the FastAPI app.

mod analytics;
mod config;
mod correlator;
mod error;
mod ingestion;
mod kv;
mod models;
mod reasoning_client;
mod scorer;
mod server;
mod store;

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use crate::config::{Args, OracleConfig};
use crate::ingestion::IngestionPipeline;
use crate::kv::AbuseSafeguards;
use crate::reasoning_client::{HttpReasoningClient, NullReasoningClient, ReasoningClient};
use crate::scorer::ThreatIntel;
use crate::server::CenterState;
use crate::store::AlertStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("oracle_center=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = OracleConfig::from_env().with_args(&args);

    let store = Arc::new(AlertStore::open(&config.store_path)?);
    tracing::info!(path = %config.store_path, alerts = store.count(), "alert store opened");

    let reasoning: Arc<dyn ReasoningClient> = match &config.reasoning_url {
        Some(url) => Arc::new(HttpReasoningClient::new(url.clone())),
        None => Arc::new(NullReasoningClient),
    };

    let pipeline = Arc::new(IngestionPipeline {
        store: store.clone(),
        safeguards: Arc::new(AbuseSafeguards::new(
            std::time::Duration::from_secs(config.dedupe_window_secs),
            config.global_minute_limit,
        )),
        reasoning,
        intel: Arc::new(ThreatIntel::default()),
    });

    let state = CenterState {
        pipeline,
        store,
        threat_score_threshold: config.threat_score_threshold,
        started_at: Instant::now(),
    };

    server::serve(config.port, state).await
}
