//! Zeek notice monitor (§4.5): converts `notice.log` records into
//! pre-escalated `Alert`s. Grounded on `zeek_notice_monitor.py`
//! (`ZeekNotice.to_severity`, `NOTICE_TO_MITRE`, `_handle_notice`).

use chrono::Utc;
use sentry_core::{Alert, AlertType, NetworkContext, Severity};

use crate::record::NoticeRecord;

const CRITICAL_NOTICES: &[&str] = &[
    "Intel::Notice",
    "Signatures::Sensitive_Signature",
    "HTTP::SQL_Injection_Attacker",
    "TeamCymruMalwareHashRegistry::Match",
];

const HIGH_NOTICES: &[&str] = &[
    "Scan::Port_Scan",
    "Scan::Address_Scan",
    "SSH::Password_Guessing",
    "FTP::Bruteforcing",
    "SSL::Invalid_Server_Cert",
    "Weird::Activity",
    "TrackerHit",
];

const MEDIUM_NOTICES: &[&str] = &[
    "SSH::Interesting_Hostname",
    "SSL::Certificate_Expired",
    "Software::Vulnerable_Version",
    "CaptureLoss::Packet_Drops",
];

/// Confidence assigned to every notice-derived alert (§4.5): Zeek's
/// policy scripts have already pre-filtered these events.
pub const NOTICE_CONFIDENCE: f64 = 0.9;

fn severity_for_note(note: &str) -> Severity {
    if CRITICAL_NOTICES.iter().any(|c| note.contains(c)) {
        Severity::Critical
    } else if HIGH_NOTICES.iter().any(|h| note.contains(h)) {
        Severity::High
    } else if MEDIUM_NOTICES.iter().any(|m| note.contains(m)) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Exact note → MITRE ATT&CK technique table (§4.5 Glossary).
fn mitre_for_note(note: &str) -> Option<&'static str> {
    match note {
        "Scan::Port_Scan" => Some("T1046 - Network Service Scanning"),
        "Scan::Address_Scan" => Some("T1046 - Network Service Scanning"),
        "SSH::Password_Guessing" => Some("T1110 - Brute Force"),
        "FTP::Bruteforcing" => Some("T1110 - Brute Force"),
        "HTTP::SQL_Injection_Attacker" => Some("T1190 - Exploit Public-Facing Application"),
        "SSL::Invalid_Server_Cert" => Some("T1557 - Adversary-in-the-Middle"),
        "Intel::Notice" => Some("Indicator of Compromise Match"),
        "Weird::Activity" => Some("T1205 - Traffic Signaling / Protocol Anomaly"),
        "TeamCymruMalwareHashRegistry::Match" => Some("T1204 - User Execution (Malware)"),
        "Software::Vulnerable_Version" => Some("T1203 - Exploitation for Client Execution"),
        _ => None,
    }
}

fn category(note: &str) -> &str {
    note.split("::").next().unwrap_or(note)
}

/// Build the canonical alert for one notice record.
pub fn notice_to_alert(notice: &NoticeRecord) -> Alert {
    let severity = severity_for_note(&notice.note);
    let mitre = mitre_for_note(&notice.note);
    let alert_type = AlertType::from_zeek_category(category(&notice.note));

    let mut description = format!("[{}] {}", notice.note, notice.msg);
    if let Some(sub) = &notice.sub {
        description.push_str(" - ");
        description.push_str(sub);
    }

    let mut raw = serde_json::json!({
        "notice_type": notice.note,
        "category": category(&notice.note),
        "confidence": NOTICE_CONFIDENCE,
    });
    if let Some(mitre) = mitre {
        raw["mitre_technique"] = serde_json::Value::String(mitre.to_string());
    }

    let network_context = NetworkContext {
        src_ip: notice.src_ip.clone(),
        src_port: notice.src_port,
        dest_ip: notice.dest_ip.clone(),
        dest_port: notice.dest_port,
        ..Default::default()
    };

    Alert {
        id: 0,
        source: "zeek_notice".to_string(),
        alert_type,
        severity,
        title: notice.note.clone(),
        description,
        timestamp: Utc::now(),
        created_at: None,
        processed_at: None,
        threat_score: None,
        risk_level: None,
        raw_data: raw,
        network_context: Some(network_context),
        indicators: {
            let mut indicators = Vec::new();
            if let Some(src_ip) = &notice.src_ip {
                indicators.push(format!("IP:{src_ip}"));
            }
            if let Some(mitre) = mitre {
                indicators.push(format!("MITRE:{mitre}"));
            }
            indicators
        },
        correlations: Vec::new(),
    }
}
