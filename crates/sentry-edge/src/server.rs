//! Edge HTTP surface (§6). Grounded on
//! `sx9-gateway-primary::server.rs`'s `Router` + `CorsLayer` shape,
//! and `bridge_service.py`'s route set (`/alerts`,
//! `/api/v1/alerts/suricata`, `/api/*-stats`, `/api/discovery`).

use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use sentry_core::{Alert, AlertType, Severity};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::escalator::{suricata_to_alert, SuricataAlert};
use crate::state::SharedState;

pub async fn serve(port: u16, state: SharedState) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/alerts", post(submit_alert_handler).get(list_alerts_handler))
        .route("/api/v1/alerts/suricata", post(submit_suricata_handler))
        .route("/api/kitnet-stats", get(get_kitnet_stats_handler).post(post_kitnet_stats_handler))
        .route("/api/suricata-stats", get(get_suricata_stats_handler))
        .route("/api/zeek-notices", get(get_zeek_notices_handler))
        .route("/api/discovery", get(discovery_handler))
        .route("/api/local-stats", get(get_local_stats_handler))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "sentry edge listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let inner = state.inner.read().await;
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "services": {
            "log_reader": {"status": "healthy"},
            "escalator": {"status": "healthy"},
        },
        "platform": {
            "uptime_seconds": (Utc::now() - inner.start_time).num_seconds(),
            "alerts_buffered": inner.alerts.len(),
        },
    }))
}

/// Generic alert submission (§6 `/alerts`). Mirrors
/// `bridge_service.py::submit_alert` / `AlertRequest`.
#[derive(Debug, Deserialize)]
struct AlertRequest {
    source: String,
    severity: String,
    event_type: String,
    description: String,
    #[serde(default)]
    raw_data: serde_json::Value,
    #[serde(default)]
    confidence: f64,
}

const ZEEK_ALERT_TYPES: &[&str] = &[
    "zeek_scan", "zeek_recon", "zeek_attack", "zeek_exploit", "zeek_policy", "zeek_intel", "zeek_weird", "zeek_notice",
];

/// Normalizes a free-form `event_type` to a closed `AlertType`,
/// exactly mirroring `escalate_to_oracle`'s `alert_type_map` plus the
/// zeek_* passthrough-or-fallback rule (§4.6).
fn normalize_alert_type(event_type: &str) -> AlertType {
    match event_type {
        "network_anomaly" => AlertType::NetworkAnomaly,
        "ids_alert" => AlertType::IdsAlert,
        "intrusion_detection" => AlertType::IntrusionDetection,
        et if et.starts_with("zeek_") => {
            if ZEEK_ALERT_TYPES.contains(&et) {
                match et {
                    "zeek_scan" => AlertType::ZeekScan,
                    "zeek_recon" => AlertType::ZeekRecon,
                    "zeek_attack" => AlertType::ZeekAttack,
                    "zeek_exploit" => AlertType::ZeekExploit,
                    "zeek_policy" => AlertType::ZeekPolicy,
                    "zeek_intel" => AlertType::ZeekIntel,
                    "zeek_weird" => AlertType::ZeekWeird,
                    _ => AlertType::ZeekNotice,
                }
            } else {
                AlertType::ZeekNotice
            }
        }
        _ => AlertType::SuspiciousBehavior,
    }
}

async fn submit_alert_handler(
    State(state): State<SharedState>,
    Json(req): Json<AlertRequest>,
) -> impl IntoResponse {
    let severity = Severity::parse(&req.severity).unwrap_or(Severity::Medium);
    let mut alert = Alert {
        id: 0,
        source: req.source,
        alert_type: normalize_alert_type(&req.event_type),
        severity,
        title: format!("Sentry Alert: {}", req.event_type.to_uppercase().replace('_', " ")),
        description: req.description,
        timestamp: Utc::now(),
        created_at: None,
        processed_at: None,
        threat_score: None,
        risk_level: None,
        raw_data: req.raw_data,
        network_context: None,
        indicators: Vec::new(),
        correlations: Vec::new(),
    };

    {
        let mut inner = state.inner.write().await;
        alert.id = inner.allocate_id();
        inner.push_alert(alert.clone());
    }

    let alert_id = alert.id;
    let mut escalator = state.escalator.lock().await;
    escalator.escalate(alert).await;

    (
        axum::http::StatusCode::CREATED,
        Json(serde_json::json!({ "status": "accepted", "alert_id": alert_id })),
    )
}

#[derive(Debug, Deserialize)]
struct ListAlertsQuery {
    limit: Option<usize>,
}

async fn list_alerts_handler(
    State(state): State<SharedState>,
    Query(q): Query<ListAlertsQuery>,
) -> impl IntoResponse {
    let inner = state.inner.read().await;
    let limit = q.limit.unwrap_or(100);
    Json(inner.recent_alerts(limit))
}

/// Suricata EVE JSON shape as received over the wire, flattened by
/// axum's `Json` extractor into `SuricataAlert` (§4.6).
#[derive(Debug, Deserialize)]
struct SuricataWireRequest {
    alert: SuricataAlertFields,
    network: SuricataNetworkFields,
    flow_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SuricataAlertFields {
    signature: String,
    category: String,
    severity: u8,
    signature_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SuricataNetworkFields {
    src_ip: String,
    dest_ip: String,
    dest_port: Option<u16>,
    #[serde(default = "default_protocol")]
    protocol: String,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

async fn submit_suricata_handler(
    State(state): State<SharedState>,
    Json(req): Json<SuricataWireRequest>,
) -> impl IntoResponse {
    let normalized = SuricataAlert {
        signature: req.alert.signature,
        category: req.alert.category,
        severity: req.alert.severity,
        signature_id: req.alert.signature_id,
        src_ip: req.network.src_ip,
        dest_ip: req.network.dest_ip,
        dest_port: req.network.dest_port,
        protocol: req.network.protocol,
        flow_id: req.flow_id,
    };
    let mut alert = suricata_to_alert(&normalized);
    let mitre = alert
        .raw_data
        .get("mitre_technique")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    {
        let mut inner = state.inner.write().await;
        alert.id = inner.allocate_id();
        inner.suricata_stats.record(
            alert.severity.as_str(),
            &normalized.category,
            &normalized.signature,
            mitre.as_deref(),
        );
        inner.push_alert(alert.clone());
    }

    if matches!(alert.severity, Severity::Critical | Severity::High) {
        let mut escalator = state.escalator.lock().await;
        escalator.escalate(alert.clone()).await;
    }

    (
        axum::http::StatusCode::CREATED,
        Json(serde_json::json!({ "status": "accepted", "alert_id": alert.id, "mitre": mitre })),
    )
}

#[derive(Debug, Serialize)]
struct KitnetStatsResponse {
    anomaly_score: f64,
    packets_per_sec: u64,
    escalations: u64,
}

async fn get_kitnet_stats_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let inner = state.inner.read().await;
    Json(KitnetStatsResponse {
        anomaly_score: inner.local_stats.anomaly_score,
        packets_per_sec: inner.local_stats.packets_per_sec,
        escalations: inner.local_stats.escalations,
    })
}

#[derive(Debug, Deserialize)]
struct PostKitnetStats {
    anomaly_score: Option<f64>,
    packets_per_sec: Option<u64>,
}

async fn post_kitnet_stats_handler(
    State(state): State<SharedState>,
    Json(req): Json<PostKitnetStats>,
) -> impl IntoResponse {
    let mut inner = state.inner.write().await;
    if let Some(score) = req.anomaly_score {
        inner.local_stats.anomaly_score = score;
    }
    if let Some(pps) = req.packets_per_sec {
        inner.local_stats.packets_per_sec = pps;
    }
    axum::http::StatusCode::OK
}

async fn get_suricata_stats_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let inner = state.inner.read().await;
    Json(serde_json::json!({
        "alerts_received": inner.suricata_stats.alerts_received,
        "by_severity": inner.suricata_stats.by_severity,
        "by_category": inner.suricata_stats.by_category,
        "recent_signatures": inner.suricata_stats.recent_signatures,
        "mitre_techniques": inner.suricata_stats.mitre_techniques,
    }))
}

async fn get_zeek_notices_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let inner = state.inner.read().await;
    let notices: Vec<&Alert> = inner.zeek_notices.iter().rev().collect();
    Json(notices)
}

async fn discovery_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "sentry-edge",
        "sources": ["zeek", "suricata", "kitnet"],
        "endpoints": [
            "/health", "/alerts", "/api/v1/alerts/suricata",
            "/api/kitnet-stats", "/api/suricata-stats", "/api/zeek-notices", "/api/local-stats",
        ],
    }))
}

async fn get_local_stats_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let inner = state.inner.read().await;
    Json(serde_json::json!({
        "anomaly_score": inner.local_stats.anomaly_score,
        "packets_per_sec": inner.local_stats.packets_per_sec,
        "escalations": inner.local_stats.escalations,
        "start_time": inner.start_time,
    }))
}
