use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Alert severity. Ordered low..critical for the step-function
/// comparisons used by the detector and the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Fixed severity-weight table (Glossary).
    pub fn weight(self) -> f64 {
        match self {
            Severity::Low => 0.2,
            Severity::Medium => 0.5,
            Severity::High => 0.8,
            Severity::Critical => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(CoreError::InvalidSeverity(other.to_string())),
        }
    }
}

/// Closed alert-type enumeration (§3). The six original types carry a
/// fixed weight (Glossary); the `zeek_*` and `ids_alert` variants come
/// from the notice monitor / signature engine and are not in the
/// documented weight table, so they fall back to `DEFAULT_TYPE_WEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NetworkAnomaly,
    IdsAlert,
    IntrusionDetection,
    MalwareDetection,
    DataExfiltration,
    UnauthorizedAccess,
    SuspiciousBehavior,
    ZeekScan,
    ZeekRecon,
    ZeekAttack,
    ZeekExploit,
    ZeekPolicy,
    ZeekIntel,
    ZeekWeird,
    ZeekNotice,
}

/// Weight used for alert types absent from the documented table.
pub const DEFAULT_TYPE_WEIGHT: f64 = 0.5;

impl AlertType {
    pub fn weight(self) -> f64 {
        match self {
            AlertType::NetworkAnomaly => 0.6,
            AlertType::IntrusionDetection => 0.9,
            AlertType::MalwareDetection => 1.0,
            AlertType::SuspiciousBehavior => 0.7,
            AlertType::DataExfiltration => 1.0,
            AlertType::UnauthorizedAccess => 0.9,
            _ => DEFAULT_TYPE_WEIGHT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::NetworkAnomaly => "network_anomaly",
            AlertType::IdsAlert => "ids_alert",
            AlertType::IntrusionDetection => "intrusion_detection",
            AlertType::MalwareDetection => "malware_detection",
            AlertType::DataExfiltration => "data_exfiltration",
            AlertType::UnauthorizedAccess => "unauthorized_access",
            AlertType::SuspiciousBehavior => "suspicious_behavior",
            AlertType::ZeekScan => "zeek_scan",
            AlertType::ZeekRecon => "zeek_recon",
            AlertType::ZeekAttack => "zeek_attack",
            AlertType::ZeekExploit => "zeek_exploit",
            AlertType::ZeekPolicy => "zeek_policy",
            AlertType::ZeekIntel => "zeek_intel",
            AlertType::ZeekWeird => "zeek_weird",
            AlertType::ZeekNotice => "zeek_notice",
        }
    }

    /// Maps a Zeek notice category (e.g. "Scan", "Intel") to the
    /// matching `zeek_*` alert type, falling back to `zeek_notice`.
    pub fn from_zeek_category(category: &str) -> Self {
        match category.to_lowercase().as_str() {
            "scan" => AlertType::ZeekScan,
            "recon" => AlertType::ZeekRecon,
            "attack" => AlertType::ZeekAttack,
            "exploit" => AlertType::ZeekExploit,
            "policy" => AlertType::ZeekPolicy,
            "intel" => AlertType::ZeekIntel,
            "weird" => AlertType::ZeekWeird,
            _ => AlertType::ZeekNotice,
        }
    }
}

/// Network context attached to an alert: the connection tuple the
/// alert was derived from, when known.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkContext {
    #[serde(default)]
    pub src_ip: Option<String>,
    #[serde(default)]
    pub dest_ip: Option<String>,
    #[serde(default)]
    pub src_port: Option<u16>,
    #[serde(default)]
    pub dest_port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub connection_count: Option<u32>,
    #[serde(default)]
    pub external_connection: Option<bool>,
    #[serde(default)]
    pub bytes_transferred: Option<u64>,
    #[serde(default)]
    pub failed_auth: Option<u32>,
}

/// A correlation record attached by the Alert Correlator (§4.9): the
/// id of a related alert, which channel found it, and the channel's
/// score for that pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correlation {
    pub alert_id: u64,
    pub channel: CorrelationChannel,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationChannel {
    Temporal,
    Network,
    Behavioral,
}

/// The canonical unit of inter-tier communication and center-side
/// persistence (§3). `id`, `created_at`, `processed_at`, `score`,
/// `risk_level`, and `correlations` are set exactly once, by the
/// center (id on persist, the rest by the Background Scorer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub id: u64,
    pub source: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub threat_score: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub raw_data: serde_json::Value,
    #[serde(default)]
    pub network_context: Option<NetworkContext>,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub correlations: Vec<Correlation>,
}

impl Alert {
    /// Content used for the dedupe key: `source || alert_type || description`.
    pub fn dedupe_content(&self) -> String {
        format!("{}:{}:{}", self.source, self.alert_type.as_str(), self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_weight_table_matches_glossary() {
        assert_eq!(Severity::Low.weight(), 0.2);
        assert_eq!(Severity::Medium.weight(), 0.5);
        assert_eq!(Severity::High.weight(), 0.8);
        assert_eq!(Severity::Critical.weight(), 1.0);
    }

    #[test]
    fn alert_type_weight_table_matches_glossary() {
        assert_eq!(AlertType::NetworkAnomaly.weight(), 0.6);
        assert_eq!(AlertType::IntrusionDetection.weight(), 0.9);
        assert_eq!(AlertType::MalwareDetection.weight(), 1.0);
        assert_eq!(AlertType::SuspiciousBehavior.weight(), 0.7);
        assert_eq!(AlertType::DataExfiltration.weight(), 1.0);
        assert_eq!(AlertType::UnauthorizedAccess.weight(), 0.9);
        assert_eq!(AlertType::ZeekScan.weight(), DEFAULT_TYPE_WEIGHT);
    }

    #[test]
    fn zeek_category_mapping() {
        assert_eq!(AlertType::from_zeek_category("Scan").as_str(), "zeek_scan");
        assert_eq!(AlertType::from_zeek_category("Unknown").as_str(), "zeek_notice");
    }

    #[test]
    fn severity_parse_roundtrip() {
        for s in ["low", "medium", "high", "critical"] {
            assert_eq!(Severity::parse(s).unwrap().as_str(), s);
        }
        assert!(Severity::parse("bogus").is_err());
    }
}
