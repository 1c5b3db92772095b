//! Center HTTP surface (§6). Grounded on `oracle_service.py`'s
//! `create_app` route set (`/health`, `/api/alerts`, `/api/analytics`)
//! and `sx9-gateway-primary::server.rs`'s `Router` + `CorsLayer` shape.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::analytics::analyze_threats;
use crate::ingestion::{analytics_for_window, IngestionPipeline};
use crate::models::{AlertIngestRequest, AnalyticsResponse, HealthResponse, SystemStatus, ThreatAnalysisRequest};
use crate::store::AlertStore;

#[derive(Clone)]
pub struct CenterState {
    pub pipeline: Arc<IngestionPipeline>,
    pub store: Arc<AlertStore>,
    pub threat_score_threshold: f64,
    pub started_at: Instant,
}

pub async fn serve(port: u16, state: CenterState) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/alerts", post(receive_alert_handler))
        .route("/api/analytics", get(analytics_handler))
        .route("/api/threats", get(threats_handler))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "oracle center listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(State(state): State<CenterState>) -> impl IntoResponse {
    let alerts_processed = state.store.count() as u64;
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: serde_json::json!({
            "store": {"status": "healthy", "type": "sled"},
            "reasoning": {"status": "configured"},
        }),
        system: SystemStatus {
            deployment_env: std::env::var("ORACLE_DEPLOYMENT_ENV").unwrap_or_else(|_| "production".to_string()),
            alerts_processed,
            threat_score_threshold: state.threat_score_threshold,
            uptime_seconds: state.started_at.elapsed().as_secs() as i64,
        },
    })
}

async fn receive_alert_handler(
    State(state): State<CenterState>,
    Json(request): Json<AlertIngestRequest>,
) -> impl IntoResponse {
    let alert = request.into();
    let response = state.pipeline.accept(alert);
    (StatusCode::OK, Json(response))
}

#[derive(Debug, Deserialize)]
struct AnalyticsQuery {
    #[serde(default = "default_time_range")]
    time_range: String,
}

fn default_time_range() -> String {
    "24h".to_string()
}

fn parse_time_range_secs(time_range: &str) -> i64 {
    let digits: String = time_range.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value: i64 = digits.parse().unwrap_or(24);
    match time_range.chars().last() {
        Some('h') => value * 3600,
        Some('d') => value * 86400,
        Some('m') => value * 60,
        _ => value * 3600,
    }
}

async fn analytics_handler(State(state): State<CenterState>, Query(query): Query<AnalyticsQuery>) -> impl IntoResponse {
    let window_secs = parse_time_range_secs(&query.time_range);
    let (alerts, top_threats, risk_score) = analytics_for_window(&state.store, window_secs);

    let mut by_severity: std::collections::HashMap<&'static str, u64> = std::collections::HashMap::new();
    let mut by_type: std::collections::HashMap<&'static str, u64> = std::collections::HashMap::new();
    for alert in &alerts {
        *by_severity.entry(alert.severity.as_str()).or_default() += 1;
        *by_type.entry(alert.alert_type.as_str()).or_default() += 1;
    }

    Json(AnalyticsResponse {
        time_range: query.time_range,
        total_alerts: alerts.len() as u64,
        risk_score,
        alerts,
        alerts_by_severity: serde_json::json!(by_severity),
        alerts_by_type: serde_json::json!(by_type),
        top_threats,
        trend_data: Vec::new(),
        generated_at: Utc::now(),
        ai_insight: None,
    })
}

/// §4.10's full analysis contract, exposed read-only for operator
/// tooling (not in the original's externally-documented route set, but
/// the deterministic analysis it wraps is a named module operation).
async fn threats_handler(
    State(state): State<CenterState>,
    Query(query): Query<ThreatAnalysisRequest>,
) -> impl IntoResponse {
    let mut alerts = state.store.since(Utc::now() - chrono::Duration::seconds(query.time_window)).unwrap_or_default();
    if let Some(threat_type) = query.threat_type {
        alerts.retain(|a| a.alert_type == threat_type);
    }
    if let Some(severity) = query.severity_filter {
        alerts.retain(|a| a.severity == severity);
    }
    Json(analyze_threats(&alerts, query.time_window))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_parsing_matches_units() {
        assert_eq!(parse_time_range_secs("24h"), 24 * 3600);
        assert_eq!(parse_time_range_secs("7d"), 7 * 86400);
        assert_eq!(parse_time_range_secs("30m"), 30 * 60);
    }
}
