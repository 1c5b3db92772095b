//! Escalator (§4.6): builds canonical alerts from detector scores and
//! from Suricata EVE-shaped input, then delivers them to the center
//! with a bounded retry queue. Grounded on `bridge_service.py`
//! (`escalate_to_oracle`, `submit_suricata_alert`,
//! `SURICATA_CATEGORY_TO_MITRE`).

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use sentry_core::{Alert, AlertType, NetworkContext, Severity};
use serde::Deserialize;
use tracing::{error, info, warn};

const RETRY_QUEUE_CAP: usize = 100;
const ESCALATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Exact Suricata rule-category → MITRE technique table (§4.6 Glossary).
fn suricata_category_to_mitre(category: &str) -> Option<&'static str> {
    match category {
        "A Network Trojan was detected" => Some("T1071"),
        "Malware Command and Control Activity Detected" => Some("T1071"),
        "Attempted Administrator Privilege Gain" => Some("T1068"),
        "Attempted User Privilege Gain" => Some("T1068"),
        "Potential Corporate Privacy Violation" => Some("T1041"),
        "Web Application Attack" => Some("T1190"),
        "Exploit Kit Activity Detected" => Some("T1189"),
        "A suspicious filename was detected" => Some("T1204"),
        "Potentially Bad Traffic" => Some("T1571"),
        "Misc activity" => Some("T1071"),
        "Not Suspicious Traffic" | "Unknown Traffic" => None,
        _ => None,
    }
}

/// Raw Suricata EVE alert shape accepted on `/api/v1/alerts/suricata`.
#[derive(Debug, Deserialize)]
pub struct SuricataAlert {
    pub signature: String,
    pub category: String,
    /// 1=critical, 2=high, 3=medium, else=low (§4.6).
    pub severity: u8,
    pub signature_id: Option<u64>,
    pub src_ip: String,
    pub dest_ip: String,
    pub dest_port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub flow_id: Option<u64>,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

fn suricata_severity(level: u8) -> Severity {
    match level {
        1 => Severity::Critical,
        2 => Severity::High,
        3 => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Strip CR/LF from attacker-controlled strings before they reach the
/// log (§4.6: log-injection sanitization).
fn sanitize_for_log(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

/// Build the canonical alert from a Suricata EVE-shaped request.
pub fn suricata_to_alert(req: &SuricataAlert) -> Alert {
    let severity = suricata_severity(req.severity);
    let mitre = suricata_category_to_mitre(&req.category);

    let mut description = format!(
        "{} | {} → {}:{} ({})",
        req.signature,
        req.src_ip,
        req.dest_ip,
        req.dest_port.map(|p| p.to_string()).unwrap_or_default(),
        req.protocol
    );
    if let Some(mitre) = mitre {
        description.push_str(&format!(" [MITRE: {mitre}]"));
    }

    let safe_signature: String = sanitize_for_log(&req.signature).chars().take(50).collect();
    let safe_severity = sanitize_for_log(severity.as_str());
    info!(signature = %safe_signature, severity = %safe_severity, "suricata alert ingested");

    let raw_data = serde_json::json!({
        "signature_id": req.signature_id,
        "signature": req.signature,
        "category": req.category,
        "src_ip": req.src_ip,
        "dest_ip": req.dest_ip,
        "dest_port": req.dest_port,
        "protocol": req.protocol,
        "flow_id": req.flow_id,
        "mitre_technique": mitre,
    });

    let mut indicators = Vec::new();
    if let Some(mitre) = mitre {
        indicators.push(format!("MITRE:{mitre}"));
    }
    indicators.push(format!("SIG:{}", req.signature.chars().take(50).collect::<String>()));
    indicators.push(format!("IP:{}", req.src_ip));

    Alert {
        id: 0,
        source: "suricata".to_string(),
        alert_type: AlertType::IdsAlert,
        severity,
        title: format!("Suricata: {}", req.category),
        description,
        timestamp: Utc::now(),
        created_at: None,
        processed_at: None,
        threat_score: None,
        risk_level: None,
        raw_data,
        network_context: Some(NetworkContext {
            src_ip: Some(req.src_ip.clone()),
            dest_ip: Some(req.dest_ip.clone()),
            dest_port: req.dest_port,
            protocol: Some(req.protocol.clone()),
            ..Default::default()
        }),
        indicators,
        correlations: Vec::new(),
    }
}

/// Severity step function over a detector score in [0,1] (§4.4/§4.6).
pub fn severity_for_score(score: f64) -> Severity {
    if score >= 0.95 {
        Severity::Critical
    } else if score >= 0.80 {
        Severity::High
    } else if score >= 0.60 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Build the canonical alert for one anomaly score from the detector.
pub fn score_to_alert(score: f64, src_ip: &str, dest_ip: &str) -> Alert {
    let severity = severity_for_score(score);
    Alert {
        id: 0,
        source: "kitnet".to_string(),
        alert_type: AlertType::NetworkAnomaly,
        severity,
        title: "Anomalous traffic pattern detected".to_string(),
        description: format!("Ensemble autoencoder anomaly score {score:.3} for {src_ip} -> {dest_ip}"),
        timestamp: Utc::now(),
        created_at: None,
        processed_at: None,
        threat_score: None,
        risk_level: None,
        raw_data: serde_json::json!({ "anomaly_score": score }),
        network_context: Some(NetworkContext {
            src_ip: Some(src_ip.to_string()),
            dest_ip: Some(dest_ip.to_string()),
            ..Default::default()
        }),
        indicators: Vec::new(),
        correlations: Vec::new(),
    }
}

/// Delivers alerts to the center over HTTP with a bounded retry
/// queue: a failed delivery is requeued at the front (retried next),
/// and the queue drops its oldest entry on overflow (§4.6, §9
/// "unbounded retry queue → capped queue with drop-oldest").
pub struct Escalator {
    client: reqwest::Client,
    oracle_url: String,
    queue: VecDeque<Alert>,
    dropped: u64,
}

impl Escalator {
    pub fn new(oracle_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(ESCALATION_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            client,
            oracle_url: oracle_url.into(),
            queue: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn enqueue(&mut self, alert: Alert) {
        if self.queue.len() >= RETRY_QUEUE_CAP {
            self.queue.pop_front();
            self.dropped += 1;
            warn!(dropped_total = self.dropped, "escalation retry queue full, dropped oldest alert");
        }
        self.queue.push_back(alert);
    }

    /// Submit one alert immediately; on failure it joins the retry
    /// queue for the next `drain` call.
    pub async fn escalate(&mut self, alert: Alert) {
        match self.send(&alert).await {
            Ok(()) => info!(source = %alert.source, "escalated alert to center"),
            Err(err) => {
                error!(%err, "escalation delivery failed, queuing for retry");
                self.enqueue(alert);
            }
        }
    }

    /// Drain the retry queue once, requeuing anything that still
    /// fails (§4.6).
    pub async fn drain_retries(&mut self) {
        let pending: Vec<Alert> = self.queue.drain(..).collect();
        for alert in pending {
            match self.send(&alert).await {
                Ok(()) => info!(source = %alert.source, "retry escalation succeeded"),
                Err(err) => {
                    warn!(%err, "retry escalation failed again");
                    self.enqueue(alert);
                }
            }
        }
    }

    async fn send(&self, alert: &Alert) -> Result<(), reqwest::Error> {
        let response = self.client.post(&self.oracle_url).json(alert).send().await?;
        response.error_for_status().map(|_| ())
    }
}
