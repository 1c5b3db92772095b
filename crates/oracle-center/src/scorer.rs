//! Background Scorer (§4.9): deterministic threat scoring. Grounded on
//! `examples/original_source/oracle/src/analytics.py`'s
//! `ThreatAnalyzer._calculate_threat_score_deterministic` and its four
//! weighted sub-scores. The AI-augmented path
//! (`_calculate_threat_score_ai`) is represented by the
//! `reasoning_client` adapter: when a reasoning client is configured,
//! its score (already confidence-weighted) replaces the deterministic
//! one, with the deterministic path as the unconditional fallback.

use std::collections::HashSet;

use regex::Regex;
use sentry_core::Alert;

/// Ports the original flagged as unusual destinations worth scoring up.
const UNUSUAL_PORTS: &[u16] = &[22, 23, 135, 139, 445, 1433, 3389];

fn attack_patterns() -> &'static [Regex] {
    use std::sync::OnceLock;
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)^.*\.exe$").unwrap(),
            Regex::new(r"(?i)^.*\.(php|jsp|asp).*\?.*$").unwrap(),
            Regex::new(r"(?i)^.*[<>].*$").unwrap(),
        ]
    })
}

fn matches_attack_pattern(indicator: &str) -> bool {
    attack_patterns().iter().any(|re| re.is_match(indicator))
}

/// Threat intelligence feeds the indicator scorer checks indicators
/// against; empty until a feed is wired up, matching the deployment
/// this was grounded on.
#[derive(Default)]
pub struct ThreatIntel {
    pub malicious_ips: HashSet<String>,
    pub suspicious_domains: HashSet<String>,
}

fn context_score(alert: &Alert) -> f64 {
    let mut score = 0.0;

    if let Some(ctx) = &alert.network_context {
        if ctx.connection_count.unwrap_or(0) > 100 {
            score += 0.3;
        }
        if let Some(port) = ctx.dest_port {
            if UNUSUAL_PORTS.contains(&port) {
                score += 0.2;
            }
        }
        if ctx.external_connection.unwrap_or(false) {
            score += 0.2;
        }
        if ctx.bytes_transferred.unwrap_or(0) > 1_000_000 {
            score += 0.2;
        }
        if ctx.failed_auth.unwrap_or(0) > 5 {
            score += 0.3;
        }
    }

    score.min(1.0)
}

/// Historical score from the count of same-type alerts in the last 24h
/// (the caller supplies the count; the store owns the time-range scan).
fn historical_score(similar_alert_count_24h: u64) -> f64 {
    if similar_alert_count_24h > 10 {
        0.8
    } else if similar_alert_count_24h > 5 {
        0.6
    } else if similar_alert_count_24h > 2 {
        0.4
    } else {
        0.2
    }
}

fn indicator_score(alert: &Alert, intel: &ThreatIntel) -> f64 {
    let mut score = 0.0;
    for indicator in &alert.indicators {
        if intel.malicious_ips.contains(indicator) {
            score += 0.4;
        } else if intel.suspicious_domains.contains(indicator) {
            score += 0.3;
        }
        if matches_attack_pattern(indicator) {
            score += 0.2;
        }
    }
    score.min(1.0)
}

/// Deterministic threat score: `base*0.3 + context*0.3 + historical*0.2
/// + indicator*0.2`, clamped to `[0, 1]`.
pub fn score_deterministic(alert: &Alert, similar_alert_count_24h: u64, intel: &ThreatIntel) -> f64 {
    let base = (alert.severity.weight() + alert.alert_type.weight()) / 2.0;
    let context = context_score(alert);
    let historical = historical_score(similar_alert_count_24h);
    let indicator = indicator_score(alert, intel);

    let final_score = base * 0.3 + context * 0.3 + historical * 0.2 + indicator * 0.2;
    final_score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentry_core::{AlertType, NetworkContext, Severity};

    fn base_alert() -> Alert {
        Alert {
            id: 1,
            source: "edge-1".into(),
            alert_type: AlertType::NetworkAnomaly,
            severity: Severity::Medium,
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
        }
    }

    #[test]
    fn base_score_with_no_context_uses_only_type_and_severity() {
        let alert = base_alert();
        let intel = ThreatIntel::default();
        let score = score_deterministic(&alert, 0, &intel);
        let base = (Severity::Medium.weight() + AlertType::NetworkAnomaly.weight()) / 2.0;
        let expected = base * 0.3 + 0.0 * 0.3 + historical_score(0) * 0.2 + 0.0 * 0.2;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn context_score_accumulates_independent_signals() {
        let mut alert = base_alert();
        alert.network_context = Some(NetworkContext {
            connection_count: Some(500),
            dest_port: Some(3389),
            external_connection: Some(true),
            bytes_transferred: Some(2_000_000),
            failed_auth: Some(10),
            ..Default::default()
        });
        assert_eq!(context_score(&alert), 1.0);
    }

    #[test]
    fn executable_indicator_matches_attack_pattern() {
        assert!(matches_attack_pattern("payload.exe"));
        assert!(matches_attack_pattern("shell.php?cmd=1"));
        assert!(matches_attack_pattern("<script>"));
        assert!(!matches_attack_pattern("normal.txt"));
    }

    #[test]
    fn historical_score_thresholds_match_table() {
        assert_eq!(historical_score(11), 0.8);
        assert_eq!(historical_score(6), 0.6);
        assert_eq!(historical_score(3), 0.4);
        assert_eq!(historical_score(1), 0.2);
    }

    #[test]
    fn final_score_never_exceeds_unit_interval() {
        let mut alert = base_alert();
        alert.severity = Severity::Critical;
        alert.alert_type = AlertType::MalwareDetection;
        alert.indicators = vec!["a.exe".into(), "b.exe".into(), "c.exe".into()];
        alert.network_context = Some(NetworkContext {
            connection_count: Some(500),
            dest_port: Some(22),
            external_connection: Some(true),
            bytes_transferred: Some(5_000_000),
            failed_auth: Some(20),
            ..Default::default()
        });
        let intel = ThreatIntel::default();
        let score = score_deterministic(&alert, 50, &intel);
        assert!(score <= 1.0);
    }
}
