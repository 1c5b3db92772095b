//! Ingestion pipeline (§4.8): the abuse-safeguard check, persistence,
//! and background scoring/correlation that together implement
//! `/api/alerts`. Grounded on
//! `examples/original_source/oracle/src/oracle_service.py`'s
//! `receive_alert` and `process_alert_background` — the original ran
//! scoring as a FastAPI `BackgroundTask` after responding `202`; here
//! the same split is a `tokio::spawn` after the synchronous persist.

use std::sync::Arc;

use chrono::Utc;
use sentry_core::Alert;
use tracing::{info, warn};

use crate::analytics;
use crate::correlator;
use crate::kv::AbuseSafeguards;
use crate::models::AlertResponse;
use crate::reasoning_client::{weighted_score, ReasoningClient};
use crate::scorer::{self, ThreatIntel};
use crate::store::AlertStore;

pub struct IngestionPipeline {
    pub store: Arc<AlertStore>,
    pub safeguards: Arc<AbuseSafeguards>,
    pub reasoning: Arc<dyn ReasoningClient>,
    pub intel: Arc<ThreatIntel>,
}

impl IngestionPipeline {
    /// Layer 1 (abuse prevention) plus persistence. Returns the
    /// response to hand back to the caller immediately; scoring and
    /// correlation run afterward in the background.
    pub fn accept(&self, alert: Alert) -> AlertResponse {
        if let Err(reason) = self.safeguards.check_and_record(&alert) {
            info!(?reason, source = %alert.source, "alert filtered by abuse safeguards");
            return AlertResponse {
                alert_id: 0,
                status: "filtered_or_throttled".to_string(),
                threat_score: None,
                correlations: Vec::new(),
                processing_time_ms: 0,
            };
        }

        match self.store.insert(alert) {
            Ok(stored) => {
                let pipeline = self.clone_handles();
                let alert_id = stored.id;
                tokio::spawn(async move {
                    pipeline.process_background(alert_id).await;
                });

                AlertResponse {
                    alert_id,
                    status: "received".to_string(),
                    threat_score: None,
                    correlations: Vec::new(),
                    processing_time_ms: 0,
                }
            }
            Err(err) => {
                warn!(%err, "failed to persist alert");
                AlertResponse {
                    alert_id: 0,
                    status: "error".to_string(),
                    threat_score: None,
                    correlations: Vec::new(),
                    processing_time_ms: 0,
                }
            }
        }
    }

    fn clone_handles(&self) -> Self {
        Self {
            store: self.store.clone(),
            safeguards: self.safeguards.clone(),
            reasoning: self.reasoning.clone(),
            intel: self.intel.clone(),
        }
    }

    /// Scores and correlates a persisted alert, then writes the result
    /// back to the store.
    async fn process_background(&self, alert_id: u64) {
        let Ok(Some(mut alert)) = self.store.get(alert_id) else {
            return;
        };

        let similar_count = match self.store.since(Utc::now() - chrono::Duration::hours(24)) {
            Ok(recent) => recent.iter().filter(|a| a.alert_type == alert.alert_type).count() as u64,
            Err(_) => 0,
        };

        let threat_score = match self.reasoning.assess(&alert).await {
            Some(assessment) => weighted_score(&assessment),
            None => scorer::score_deterministic(&alert, similar_count, &self.intel),
        };

        let candidates = self.store.since(Utc::now() - chrono::Duration::minutes(30)).unwrap_or_default();
        let correlations = correlator::find_correlations(&alert, &candidates);

        alert.threat_score = Some(threat_score);
        alert.correlations = correlations;
        alert.processed_at = Some(Utc::now());

        if let Err(err) = self.store.update(&alert) {
            warn!(%err, alert_id, "failed to persist scored alert");
        }
    }
}

/// Rolling analytics over the last `time_window` seconds (§4.10),
/// grounded on `calculate_analytics`. Returns the alerts in the window
/// plus the top threat clusters found in them, for the caller to
/// assemble into an `AnalyticsResponse`.
pub fn analytics_for_window(
    store: &AlertStore,
    time_window_secs: i64,
) -> (Vec<Alert>, Vec<crate::models::ThreatInfo>, f64) {
    let alerts = store.since(Utc::now() - chrono::Duration::seconds(time_window_secs)).unwrap_or_default();
    if alerts.is_empty() {
        return (alerts, Vec::new(), 0.0);
    }
    let groups = analytics::group_threats(&alerts);
    let mut threats: Vec<_> = groups.values().filter_map(|g| analytics::analyze_threat_group(g)).collect();
    threats.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
    let risk_score = analytics::calculate_overall_risk(&threats);
    (alerts, threats, risk_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning_client::NullReasoningClient;
    use sentry_core::{AlertType, Severity};

    fn sample_alert() -> Alert {
        Alert {
            id: 0,
            source: "edge-1".into(),
            alert_type: AlertType::NetworkAnomaly,
            severity: Severity::Low,
            title: "t".into(),
            description: "d".into(),
            timestamp: Utc::now(),
            created_at: None,
            processed_at: None,
            threat_score: None,
            risk_level: None,
            raw_data: serde_json::Value::Null,
            network_context: None,
            indicators: Vec::new(),
            correlations: Vec::new(),
        }
    }

    fn test_pipeline(dir: &std::path::Path) -> IngestionPipeline {
        IngestionPipeline {
            store: Arc::new(AlertStore::open(dir).unwrap()),
            safeguards: Arc::new(AbuseSafeguards::default()),
            reasoning: Arc::new(NullReasoningClient),
            intel: Arc::new(ThreatIntel::default()),
        }
    }

    #[tokio::test]
    async fn accepted_alert_gets_a_positive_id() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path());
        let response = pipeline.accept(sample_alert());
        assert_eq!(response.status, "received");
        assert!(response.alert_id > 0);
    }

    #[tokio::test]
    async fn duplicate_alert_is_filtered_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path());
        pipeline.accept(sample_alert());
        let second = pipeline.accept(sample_alert());
        assert_eq!(second.status, "filtered_or_throttled");
        assert_eq!(pipeline.store.count(), 1);
    }

    #[tokio::test]
    async fn background_scoring_eventually_fills_in_threat_score() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = test_pipeline(dir.path());
        let response = pipeline.accept(sample_alert());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let stored = pipeline.store.get(response.alert_id).unwrap().unwrap();
        assert!(stored.threat_score.is_some());
        assert!(stored.processed_at.is_some());
    }
}
