//! Shared edge state (§6): recent alerts, Suricata/KitNET statistics,
//! exposed read-only through the HTTP surface and written by the
//! ingestion/detection tasks. Grounded on
//! `sx9-gateway-primary::state::GatewayState`'s
//! `Arc<RwLock<...>>`-behind-a-type-alias shape.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sentry_core::Alert;
use tokio::sync::{Mutex, RwLock};

use crate::escalator::Escalator;

const RECENT_ALERTS_CAP: usize = 500;
const RECENT_NOTICES_CAP: usize = 100;
const RECENT_SIGNATURES_CAP: usize = 20;

/// Mirrors `BridgeService.local_stats` (§6).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LocalStats {
    pub anomaly_score: f64,
    pub packets_per_sec: u64,
    pub escalations: u64,
}

/// Mirrors `BridgeService.suricata_stats` (§6).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SuricataStats {
    pub alerts_received: u64,
    pub by_severity: HashMap<String, u64>,
    pub by_category: HashMap<String, u64>,
    pub recent_signatures: VecDeque<String>,
    pub mitre_techniques: HashMap<String, u64>,
}

impl SuricataStats {
    pub fn record(&mut self, severity: &str, category: &str, signature: &str, mitre: Option<&str>) {
        self.alerts_received += 1;
        *self.by_severity.entry(severity.to_string()).or_insert(0) += 1;
        *self.by_category.entry(category.to_string()).or_insert(0) += 1;
        if let Some(mitre) = mitre {
            *self.mitre_techniques.entry(mitre.to_string()).or_insert(0) += 1;
        }
        if !self.recent_signatures.contains(&signature.to_string()) {
            if self.recent_signatures.len() >= RECENT_SIGNATURES_CAP {
                self.recent_signatures.pop_front();
            }
            self.recent_signatures.push_back(signature.to_string());
        }
    }
}

pub struct SentryState {
    pub start_time: DateTime<Utc>,
    pub alerts: VecDeque<Alert>,
    pub zeek_notices: VecDeque<Alert>,
    pub local_stats: LocalStats,
    pub suricata_stats: SuricataStats,
    next_id: u64,
}

impl SentryState {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            alerts: VecDeque::new(),
            zeek_notices: VecDeque::new(),
            local_stats: LocalStats::default(),
            suricata_stats: SuricataStats::default(),
            next_id: 1,
        }
    }

    /// Assigns the next sequential alert id (mirrors
    /// `oracle-center::store::AlertStore::next_id`, in-memory since the
    /// edge side never persists alerts across restarts).
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn push_alert(&mut self, alert: Alert) {
        if self.alerts.len() >= RECENT_ALERTS_CAP {
            self.alerts.pop_front();
        }
        self.alerts.push_back(alert);
    }

    pub fn push_notice(&mut self, alert: Alert) {
        if self.zeek_notices.len() >= RECENT_NOTICES_CAP {
            self.zeek_notices.pop_front();
        }
        self.zeek_notices.push_back(alert);
    }

    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.alerts.iter().rev().take(limit).cloned().collect()
    }
}

impl Default for SentryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared app state handed to every axum handler (`with_state`).
#[derive(Clone)]
pub struct SharedState {
    pub inner: Arc<RwLock<SentryState>>,
    pub escalator: Arc<Mutex<Escalator>>,
}

impl SharedState {
    pub fn new(oracle_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SentryState::new())),
            escalator: Arc::new(Mutex::new(Escalator::new(oracle_url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_alerts_newest_first_and_bounded_by_limit() {
        let mut state = SentryState::new();
        for i in 0..5 {
            let mut alert = crate::escalator::score_to_alert(0.9, "10.0.0.1", "10.0.0.2");
            alert.description = format!("alert-{i}");
            state.push_alert(alert);
        }
        let recent = state.recent_alerts(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].description, "alert-4");
    }

    #[test]
    fn suricata_stats_dedupe_signatures_and_cap_at_twenty() {
        let mut stats = SuricataStats::default();
        for i in 0..25 {
            stats.record("high", "Web Application Attack", &format!("sig-{i}"), Some("T1190"));
        }
        assert_eq!(stats.recent_signatures.len(), RECENT_SIGNATURES_CAP);
        assert_eq!(stats.alerts_received, 25);
        assert_eq!(stats.mitre_techniques.get("T1190"), Some(&25));
    }
}
