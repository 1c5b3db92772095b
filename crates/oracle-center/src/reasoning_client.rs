//! Optional AI reasoning adapter for threat scoring (§4.8, §9).
//! Grounded on `examples/original_source/oracle/src/analytics.py`'s
//! `_calculate_threat_score_ai` (a chat-completion call that returns a
//! threat score weighted by its own stated confidence) and shaped as a
//! typed request/response client over `reqwest`, the way
//! `sx9-gateway-primary::glaf_client::GLAFClient` talks to its graph
//! server.
//!
//! Any failure — timeout, malformed response, disabled client — falls
//! back to `scorer::score_deterministic`; this module never propagates
//! an error up into the ingestion pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sentry_core::Alert;

#[derive(Debug, Clone)]
pub struct ReasoningAssessment {
    pub threat_score: f64,
    pub confidence: f64,
    pub kill_chain_stage: String,
    pub intent: String,
}

#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn assess(&self, alert: &Alert) -> Option<ReasoningAssessment>;
}

/// Always defers to the deterministic scorer. Used when no reasoning
/// endpoint is configured.
pub struct NullReasoningClient;

#[async_trait]
impl ReasoningClient for NullReasoningClient {
    async fn assess(&self, _alert: &Alert) -> Option<ReasoningAssessment> {
        None
    }
}

#[derive(Debug, Serialize)]
struct AssessRequest<'a> {
    alert_type: &'a str,
    severity: &'a str,
    source: &'a str,
    title: &'a str,
    description: &'a str,
    indicators: &'a [String],
}

#[derive(Debug, Deserialize)]
struct AssessResponse {
    threat_score: f64,
    confidence: f64,
    #[serde(default)]
    kill_chain_stage: String,
    #[serde(default)]
    intent: String,
}

/// Calls an HTTP reasoning endpoint that performs the Cyber Kill Chain
/// intent analysis described in the grounding source.
pub struct HttpReasoningClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReasoningClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .expect("reasoning client builds with default TLS backend"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReasoningClient for HttpReasoningClient {
    async fn assess(&self, alert: &Alert) -> Option<ReasoningAssessment> {
        let request = AssessRequest {
            alert_type: alert.alert_type.as_str(),
            severity: alert.severity.as_str(),
            source: &alert.source,
            title: &alert.title,
            description: &alert.description,
            indicators: &alert.indicators,
        };

        let response = self
            .client
            .post(format!("{}/api/v1/assess", self.base_url))
            .json(&request)
            .send()
            .await
            .ok()?;

        let body: AssessResponse = response.error_for_status().ok()?.json().await.ok()?;

        Some(ReasoningAssessment {
            threat_score: body.threat_score.clamp(0.0, 1.0),
            confidence: body.confidence.clamp(0.0, 1.0),
            kill_chain_stage: body.kill_chain_stage,
            intent: body.intent,
        })
    }
}

/// Weights the raw score by the client's own confidence, as the
/// grounding source does (`threat_score * confidence`).
pub fn weighted_score(assessment: &ReasoningAssessment) -> f64 {
    (assessment.threat_score * assessment.confidence).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_client_never_assesses() {
        let client = NullReasoningClient;
        let alert = Alert {
            id: 1,
            source: "edge-1".into(),
            alert_type: sentry_core::AlertType::NetworkAnomaly,
            severity: sentry_core::Severity::Low,
            title: "t".into(),
            description: "d".into(),
            timestamp: chrono::Utc::now(),
            created_at: None,
            processed_at: None,
            threat_score: None,
            risk_level: None,
            raw_data: serde_json::Value::Null,
            network_context: None,
            indicators: Vec::new(),
            correlations: Vec::new(),
        };
        assert!(client.assess(&alert).await.is_none());
    }

    #[test]
    fn weighted_score_multiplies_and_clamps() {
        let assessment =
            ReasoningAssessment { threat_score: 0.9, confidence: 0.8, kill_chain_stage: "".into(), intent: "".into() };
        assert!((weighted_score(&assessment) - 0.72).abs() < 1e-9);
    }
}
