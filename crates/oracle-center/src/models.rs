//! Center API request/response shapes. Grounded on
//! `examples/original_source/oracle/src/models.py`
//! (`AlertResponse`, `HealthResponse`, `SystemStatus`, `ThreatInfo`,
//! `ThreatAnalysisResponse`, `AnalyticsResponse`).

use chrono::{DateTime, Utc};
use sentry_core::{Alert, AlertType, Severity};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct AlertResponse {
    pub alert_id: u64,
    pub status: String,
    pub threat_score: Option<f64>,
    #[serde(default)]
    pub correlations: Vec<serde_json::Value>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub deployment_env: String,
    pub alerts_processed: u64,
    pub threat_score_threshold: f64,
    pub uptime_seconds: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub services: serde_json::Value,
    pub system: SystemStatus,
}

/// A detected threat cluster (§4.10). Mirrors `ThreatInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatInfo {
    pub threat_id: String,
    pub threat_type: AlertType,
    pub severity: Severity,
    pub confidence_score: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub indicators: Vec<String>,
    pub affected_assets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdRecommendation {
    pub action: String,
    pub recommended_value: f64,
    pub current_value: f64,
    pub reasoning: String,
    pub confidence: f64,
    pub expected_impact: String,
}

/// Mirrors `ThreatAnalysisResponse` in `models.py`, with
/// `threshold_recommendation` folded in from `analyze_threats`'s
/// return dict (§4.10's contract returns it alongside, even though the
/// original Pydantic model didn't carry it).
#[derive(Debug, Clone, Serialize)]
pub struct ThreatAnalysisResponse {
    pub analysis_id: String,
    pub threats_detected: Vec<ThreatInfo>,
    pub risk_score: f64,
    pub recommendations: Vec<String>,
    pub correlations: Vec<sentry_core::Correlation>,
    pub threshold_recommendation: ThresholdRecommendation,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreatAnalysisRequest {
    #[serde(default = "default_time_window")]
    pub time_window: i64,
    #[serde(default)]
    pub threat_type: Option<AlertType>,
    #[serde(default)]
    pub severity_filter: Option<Severity>,
}

fn default_time_window() -> i64 {
    3600
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsResponse {
    pub time_range: String,
    pub total_alerts: u64,
    pub risk_score: f64,
    pub alerts: Vec<Alert>,
    pub alerts_by_severity: serde_json::Value,
    pub alerts_by_type: serde_json::Value,
    pub top_threats: Vec<ThreatInfo>,
    pub trend_data: Vec<serde_json::Value>,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_insight: Option<String>,
}

/// Alert ingestion request body for `/api/alerts`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertIngestRequest {
    pub source: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub raw_data: serde_json::Value,
    #[serde(default)]
    pub network_context: Option<sentry_core::NetworkContext>,
    #[serde(default)]
    pub indicators: Vec<String>,
}

impl From<AlertIngestRequest> for Alert {
    fn from(req: AlertIngestRequest) -> Self {
        Alert {
            id: 0,
            source: req.source,
            alert_type: req.alert_type,
            severity: req.severity,
            title: req.title,
            description: req.description,
            timestamp: req.timestamp.unwrap_or_else(Utc::now),
            created_at: Some(Utc::now()),
            processed_at: None,
            threat_score: None,
            risk_level: None,
            raw_data: req.raw_data,
            network_context: req.network_context,
            indicators: req.indicators,
            correlations: Vec::new(),
        }
    }
}
