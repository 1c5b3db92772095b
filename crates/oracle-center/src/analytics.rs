//! Threat analysis (§4.10): groups alerts into threat clusters,
//! computes an overall risk score, and produces deterministic
//! recommendations and an adaptive threshold suggestion. Grounded on
//! `examples/original_source/oracle/src/analytics.py`'s
//! `ThreatAnalyzer._group_threats`, `_analyze_threat_group`,
//! `_calculate_overall_risk`, `_generate_recommendations_deterministic`,
//! and `_recommend_threshold_deterministic`. The AI-augmented
//! counterparts (`_generate_recommendations_ai`,
//! `_recommend_threshold_adjustment`) live behind the
//! `reasoning_client` adapter in the ingestion pipeline; this module is
//! the unconditional deterministic fallback, always available.

use std::collections::HashMap;

use chrono::Utc;
use sentry_core::{Alert, AlertType, Severity};

use crate::correlator;
use crate::models::{ThreatAnalysisResponse, ThreatInfo, ThresholdRecommendation};

/// Groups alerts by `{alert_type}_{source}`.
pub fn group_threats(alerts: &[Alert]) -> HashMap<String, Vec<&Alert>> {
    let mut groups: HashMap<String, Vec<&Alert>> = HashMap::new();
    for alert in alerts {
        let key = format!("{}_{}", alert.alert_type.as_str(), alert.source);
        groups.entry(key).or_default().push(alert);
    }
    groups
}

/// Summarizes one threat group: most severe member, aggregate
/// indicators, and a confidence that grows with group size.
pub fn analyze_threat_group(alerts: &[&Alert]) -> Option<ThreatInfo> {
    let most_severe = alerts.iter().max_by(|a, b| a.severity.weight().total_cmp(&b.severity.weight()))?;

    let mut indicators: Vec<String> = alerts.iter().flat_map(|a| a.indicators.iter().cloned()).collect();
    indicators.sort();
    indicators.dedup();

    let confidence_score = (alerts.len() as f64 * 0.1 + 0.3).min(1.0);

    let first_seen = alerts.iter().map(|a| a.timestamp).min()?;
    let last_seen = alerts.iter().map(|a| a.timestamp).max()?;

    Some(ThreatInfo {
        threat_id: format!("threat_{}_{}", alerts[0].alert_type.as_str(), Utc::now().timestamp()),
        threat_type: alerts[0].alert_type,
        severity: most_severe.severity,
        confidence_score,
        first_seen,
        last_seen,
        indicators,
        affected_assets: alerts.iter().map(|a| format!("{}_{}", a.source, a.id)).collect(),
    })
}

/// `sum(severity_weight * confidence) / (1 + count * 0.1)`, clamped to
/// `[0, 1]`.
pub fn calculate_overall_risk(threats: &[ThreatInfo]) -> f64 {
    if threats.is_empty() {
        return 0.0;
    }
    let total_risk: f64 = threats.iter().map(|t| t.severity.weight() * t.confidence_score).sum();
    (total_risk / (1.0 + threats.len() as f64 * 0.1)).min(1.0)
}

/// Fixed per-type recommendations plus volume-based escalation rules.
pub fn generate_recommendations(threats: &[ThreatInfo]) -> Vec<String> {
    let mut out = Vec::new();
    let types: Vec<AlertType> = threats.iter().map(|t| t.threat_type).collect();

    if types.contains(&AlertType::MalwareDetection) {
        out.push("Perform full system malware scan and isolate affected systems".to_string());
    }
    if types.contains(&AlertType::IntrusionDetection) {
        out.push("Review firewall rules and network access controls".to_string());
    }
    if types.contains(&AlertType::DataExfiltration) {
        out.push("Investigate data access logs and implement DLP controls".to_string());
    }
    if types.contains(&AlertType::UnauthorizedAccess) {
        out.push("Review user access permissions and authentication logs".to_string());
    }

    if threats.len() > 5 {
        out.push("Consider raising security alert level due to high threat volume".to_string());
    }

    let high_severity_count =
        threats.iter().filter(|t| matches!(t.severity, Severity::High | Severity::Critical)).count();
    if high_severity_count > 2 {
        out.push("Immediate security team escalation recommended".to_string());
    }

    out
}

const CURRENT_THRESHOLD: f64 = 0.95;

/// Heuristic threshold recommendation from alert volume and severity
/// mix over the analysis window.
pub fn recommend_threshold(alerts: &[Alert], time_window_secs: i64) -> ThresholdRecommendation {
    let total = alerts.len() as f64;
    let alerts_per_hour = if time_window_secs > 0 { (total / time_window_secs as f64) * 3600.0 } else { 0.0 };

    let high_severity_count =
        alerts.iter().filter(|a| matches!(a.severity, Severity::High | Severity::Critical)).count() as f64;
    let high_severity_ratio = high_severity_count / total.max(1.0);

    if alerts_per_hour < 1.0 && high_severity_ratio > 0.5 {
        ThresholdRecommendation {
            action: "LOWER".to_string(),
            recommended_value: 0.93,
            current_value: CURRENT_THRESHOLD,
            reasoning: "Low alert volume but high severity ratio suggests we may be missing threats".to_string(),
            confidence: 0.7,
            expected_impact: "Alert volume may increase".to_string(),
        }
    } else if alerts_per_hour > 20.0 && high_severity_ratio < 0.1 {
        ThresholdRecommendation {
            action: "RAISE".to_string(),
            recommended_value: 0.97,
            current_value: CURRENT_THRESHOLD,
            reasoning: "High alert volume with low severity ratio indicates potential alert fatigue".to_string(),
            confidence: 0.7,
            expected_impact: "Alert volume may decrease".to_string(),
        }
    } else {
        ThresholdRecommendation {
            action: "MAINTAIN".to_string(),
            recommended_value: 0.95,
            current_value: CURRENT_THRESHOLD,
            reasoning: "Current threshold appears balanced for the threat landscape".to_string(),
            confidence: 0.7,
            expected_impact: "Alert volume may remain stable".to_string(),
        }
    }
}

/// The full §4.10 contract: group the window's alerts into threat
/// clusters, score overall risk, generate recommendations, find
/// cross-alert correlations, and suggest a threshold adjustment.
pub fn analyze_threats(alerts: &[Alert], time_window_secs: i64) -> ThreatAnalysisResponse {
    let groups = group_threats(alerts);
    let mut threats: Vec<ThreatInfo> = groups.values().filter_map(|g| analyze_threat_group(g)).collect();
    threats.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));

    let risk_score = calculate_overall_risk(&threats);
    let recommendations = generate_recommendations(&threats);
    let threshold_recommendation = recommend_threshold(alerts, time_window_secs);
    let correlations = correlations_for_window(alerts);

    ThreatAnalysisResponse {
        analysis_id: format!("analysis_{}", Utc::now().timestamp()),
        threats_detected: threats,
        risk_score,
        recommendations,
        correlations,
        threshold_recommendation,
        processing_time_ms: 0,
    }
}

/// Correlations for every alert in the window, using the rest of the
/// window as the candidate set (§4.9 wired into §4.10's contract).
fn correlations_for_window(alerts: &[Alert]) -> Vec<sentry_core::Correlation> {
    alerts.iter().flat_map(|alert| correlator::find_correlations(alert, alerts)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentry_core::AlertType;

    fn alert(id: u64, alert_type: AlertType, source: &str, severity: Severity) -> Alert {
        Alert {
            id,
            source: source.to_string(),
            alert_type,
            severity,
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

    #[test]
    fn group_threats_groups_by_type_and_source() {
        let alerts = vec![
            alert(1, AlertType::NetworkAnomaly, "edge-1", Severity::Low),
            alert(2, AlertType::NetworkAnomaly, "edge-1", Severity::Medium),
            alert(3, AlertType::NetworkAnomaly, "edge-2", Severity::Low),
        ];
        let groups = group_threats(&alerts);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["network_anomaly_edge-1"].len(), 2);
    }

    #[test]
    fn analyze_threat_group_picks_most_severe_and_spans_time() {
        let alerts = vec![
            alert(1, AlertType::NetworkAnomaly, "edge-1", Severity::Low),
            alert(2, AlertType::NetworkAnomaly, "edge-1", Severity::Critical),
        ];
        let refs: Vec<&Alert> = alerts.iter().collect();
        let info = analyze_threat_group(&refs).unwrap();
        assert_eq!(info.severity, Severity::Critical);
        assert_eq!(info.affected_assets.len(), 2);
    }

    #[test]
    fn confidence_grows_with_group_size_but_caps_at_one() {
        let alerts: Vec<Alert> =
            (0..20).map(|i| alert(i, AlertType::NetworkAnomaly, "edge-1", Severity::Low)).collect();
        let refs: Vec<&Alert> = alerts.iter().collect();
        let info = analyze_threat_group(&refs).unwrap();
        assert_eq!(info.confidence_score, 1.0);
    }

    #[test]
    fn overall_risk_is_empty_for_no_threats() {
        assert_eq!(calculate_overall_risk(&[]), 0.0);
    }

    #[test]
    fn recommendations_flag_malware_and_escalation() {
        let threats = vec![
            ThreatInfo {
                threat_id: "t1".into(),
                threat_type: AlertType::MalwareDetection,
                severity: Severity::Critical,
                confidence_score: 0.9,
                first_seen: Utc::now(),
                last_seen: Utc::now(),
                indicators: vec![],
                affected_assets: vec![],
            },
            ThreatInfo {
                threat_id: "t2".into(),
                threat_type: AlertType::UnauthorizedAccess,
                severity: Severity::High,
                confidence_score: 0.9,
                first_seen: Utc::now(),
                last_seen: Utc::now(),
                indicators: vec![],
                affected_assets: vec![],
            },
            ThreatInfo {
                threat_id: "t3".into(),
                threat_type: AlertType::UnauthorizedAccess,
                severity: Severity::High,
                confidence_score: 0.9,
                first_seen: Utc::now(),
                last_seen: Utc::now(),
                indicators: vec![],
                affected_assets: vec![],
            },
        ];
        let recs = generate_recommendations(&threats);
        assert!(recs.iter().any(|r| r.contains("malware scan")));
        assert!(recs.iter().any(|r| r.contains("escalation")));
    }

    #[test]
    fn threshold_recommendation_lowers_for_rare_high_severity_alerts() {
        let alerts = vec![alert(1, AlertType::MalwareDetection, "edge-1", Severity::Critical)];
        let rec = recommend_threshold(&alerts, 3600);
        assert_eq!(rec.action, "LOWER");
    }

    #[test]
    fn threshold_recommendation_maintains_by_default() {
        let alerts = vec![alert(1, AlertType::NetworkAnomaly, "edge-1", Severity::Low)];
        let rec = recommend_threshold(&alerts, 3600);
        assert_eq!(rec.action, "MAINTAIN");
    }

    #[test]
    fn analyze_threats_assembles_the_full_contract() {
        let alerts = vec![
            alert(1, AlertType::MalwareDetection, "edge-1", Severity::Critical),
            alert(2, AlertType::MalwareDetection, "edge-1", Severity::Critical),
        ];
        let result = analyze_threats(&alerts, 3600);
        assert_eq!(result.threats_detected.len(), 1);
        assert!(result.risk_score > 0.0);
        assert!(result.recommendations.iter().any(|r| r.contains("malware scan")));
    }
}
