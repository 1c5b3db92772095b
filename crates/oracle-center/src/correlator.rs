//! Alert Correlator (§4.9): finds related alerts across three
//! independent channels. Grounded on
//! `examples/original_source/oracle/src/analytics.py`'s
//! `AlertCorrelator` (`_temporal_correlation`, `_network_correlation`,
//! `_behavioral_correlation`). The original ran each algorithm as a
//! separate DB query; here each takes the candidate set the caller
//! already pulled from the `AlertStore` so the correlator stays a pure
//! function over in-memory data.

use sentry_core::{Alert, Correlation, CorrelationChannel};

const TEMPORAL_WINDOW_SECS: i64 = 30 * 60;
const TEMPORAL_THRESHOLD: f64 = 0.5;
const NETWORK_SCORE: f64 = 0.8;
const BEHAVIORAL_BASE_SCORE: f64 = 0.6;
const BEHAVIORAL_SAME_SEVERITY_BONUS: f64 = 0.2;

/// Alerts within ±30 minutes score `max(0, 1 - time_diff/1800)`;
/// results below `TEMPORAL_THRESHOLD` are dropped.
pub fn temporal_correlations(alert: &Alert, candidates: &[Alert]) -> Vec<Correlation> {
    candidates
        .iter()
        .filter(|other| other.id != alert.id)
        .filter_map(|other| {
            let diff_secs = (alert.timestamp - other.timestamp).num_seconds().unsigned_abs() as f64;
            let score = (1.0 - diff_secs / TEMPORAL_WINDOW_SECS as f64).max(0.0);
            (score > TEMPORAL_THRESHOLD).then_some(Correlation {
                alert_id: other.id,
                channel: CorrelationChannel::Temporal,
                score,
            })
        })
        .collect()
}

/// Alerts sharing a source or destination IP with `alert` score a flat
/// `0.8` on the network channel.
pub fn network_correlations(alert: &Alert, candidates: &[Alert]) -> Vec<Correlation> {
    let Some(ctx) = &alert.network_context else {
        return Vec::new();
    };
    if ctx.src_ip.is_none() && ctx.dest_ip.is_none() {
        return Vec::new();
    }

    candidates
        .iter()
        .filter(|other| other.id != alert.id)
        .filter_map(|other| {
            let other_ctx = other.network_context.as_ref()?;
            let shares_ip = [&ctx.src_ip, &ctx.dest_ip]
                .into_iter()
                .flatten()
                .any(|ip| Some(ip) == other_ctx.src_ip.as_ref() || Some(ip) == other_ctx.dest_ip.as_ref());
            shares_ip.then_some(Correlation {
                alert_id: other.id,
                channel: CorrelationChannel::Network,
                score: NETWORK_SCORE,
            })
        })
        .collect()
}

/// Alerts of the same type from the same source score `0.6`, plus
/// `0.2` when the severity also matches.
pub fn behavioral_correlations(alert: &Alert, candidates: &[Alert]) -> Vec<Correlation> {
    candidates
        .iter()
        .filter(|other| other.id != alert.id)
        .filter(|other| other.alert_type == alert.alert_type && other.source == alert.source)
        .map(|other| {
            let mut score = BEHAVIORAL_BASE_SCORE;
            if other.severity == alert.severity {
                score += BEHAVIORAL_SAME_SEVERITY_BONUS;
            }
            Correlation { alert_id: other.id, channel: CorrelationChannel::Behavioral, score }
        })
        .collect()
}

/// Runs all three channels and concatenates their results.
pub fn find_correlations(alert: &Alert, candidates: &[Alert]) -> Vec<Correlation> {
    let mut out = temporal_correlations(alert, candidates);
    out.extend(network_correlations(alert, candidates));
    out.extend(behavioral_correlations(alert, candidates));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentry_core::{AlertType, NetworkContext, Severity};

    fn alert_at(id: u64, secs_offset: i64) -> Alert {
        Alert {
            id,
            source: "edge-1".into(),
            alert_type: AlertType::NetworkAnomaly,
            severity: Severity::Medium,
            title: "t".into(),
            description: "d".into(),
            timestamp: chrono::Utc::now() + chrono::Duration::seconds(secs_offset),
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
    fn temporal_correlation_decays_with_distance() {
        let alert = alert_at(1, 0);
        let near = alert_at(2, 60);
        let far = alert_at(3, 1700);
        let results = temporal_correlations(&alert, &[near.clone(), far.clone()]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].alert_id, 2);
    }

    #[test]
    fn network_correlation_requires_shared_ip() {
        let mut alert = alert_at(1, 0);
        alert.network_context = Some(NetworkContext { src_ip: Some("10.0.0.1".into()), ..Default::default() });
        let mut related = alert_at(2, 0);
        related.network_context = Some(NetworkContext { dest_ip: Some("10.0.0.1".into()), ..Default::default() });
        let mut unrelated = alert_at(3, 0);
        unrelated.network_context = Some(NetworkContext { src_ip: Some("10.0.0.9".into()), ..Default::default() });

        let results = network_correlations(&alert, &[related, unrelated]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].alert_id, 2);
        assert_eq!(results[0].score, 0.8);
    }

    #[test]
    fn behavioral_correlation_bonuses_matching_severity() {
        let alert = alert_at(1, 0);
        let mut same_severity = alert_at(2, 0);
        same_severity.severity = Severity::Medium;
        let mut diff_severity = alert_at(3, 0);
        diff_severity.severity = Severity::Low;

        let results = behavioral_correlations(&alert, &[same_severity, diff_severity]);
        let scores: Vec<f64> = results.iter().map(|c| c.score).collect();
        assert!(scores.contains(&0.8));
        assert!(scores.contains(&0.6));
    }

    #[test]
    fn behavioral_correlation_ignores_other_sources() {
        let alert = alert_at(1, 0);
        let mut other_source = alert_at(2, 0);
        other_source.source = "edge-2".into();
        assert!(behavioral_correlations(&alert, &[other_source]).is_empty());
    }
}
