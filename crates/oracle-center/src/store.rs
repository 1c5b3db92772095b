//! Alert Store (§4.8): persists every ingested alert and keeps
//! secondary indexes for the query patterns the analytics endpoints
//! need. Grounded on `examples/original_source/oracle/src/database.py`'s
//! `Alert` table and its three named indexes
//! (`idx_alerts_timestamp_severity`, `idx_alerts_source_type`,
//! `idx_alerts_threat_score`), translated from SQLAlchemy/Postgres rows
//! to `sled` trees: one primary tree keyed by id, plus one index tree
//! per query pattern mapping a composite key to a list of ids.

use sentry_core::{Alert, Severity};

use crate::error::Result;

const IDS_TREE: &str = "alerts_by_id";
const SEVERITY_INDEX_TREE: &str = "idx_severity_timestamp";
const SOURCE_TYPE_INDEX_TREE: &str = "idx_source_type";
const SCORE_INDEX_TREE: &str = "idx_threat_score";
const COUNTER_KEY: &[u8] = b"next_id";

/// Embedded, crash-safe alert persistence. One `sled::Db` per process;
/// `Alert`s are stored as JSON blobs keyed by their big-endian id so
/// range scans come back in insertion order.
///
/// The three secondary trees mirror `database.py`'s declared table
/// indexes rather than a bespoke query method per index: the original
/// never defines `get_alerts_by_severity`-style functions either, it
/// leans on the ORM's query builder hitting whichever index fits a
/// given `WHERE`/`ORDER BY`. Kept maintained here for the same reason
/// a DBA keeps an index whose query pattern isn't live yet — ordering
/// by severity, by (source, type), and by score are all named in §6's
/// persisted-state contract even though the current HTTP surface
/// answers its filters (`/api/threats`'s `threat_type`/`severity_filter`)
/// off the time-ordered primary tree instead.
pub struct AlertStore {
    db: sled::Db,
    ids: sled::Tree,
    by_severity: sled::Tree,
    by_source_type: sled::Tree,
    by_score: sled::Tree,
}

impl AlertStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let ids = db.open_tree(IDS_TREE)?;
        let by_severity = db.open_tree(SEVERITY_INDEX_TREE)?;
        let by_source_type = db.open_tree(SOURCE_TYPE_INDEX_TREE)?;
        let by_score = db.open_tree(SCORE_INDEX_TREE)?;
        Ok(Self { db, ids, by_severity, by_source_type, by_score })
    }

    fn next_id(&self) -> Result<u64> {
        let next = self.db.update_and_fetch(COUNTER_KEY, |old| {
            let current = old.map(decode_u64).unwrap_or(0);
            Some((current + 1).to_be_bytes().to_vec())
        })?;
        Ok(next.map(|v| decode_u64(&v)).unwrap_or(1))
    }

    /// Assigns an id, persists the alert, and updates every secondary
    /// index. Returns the stored alert with its id populated.
    pub fn insert(&self, mut alert: Alert) -> Result<Alert> {
        let id = self.next_id()?;
        alert.id = id;

        self.ids.insert(id.to_be_bytes(), serde_json::to_vec(&alert)?)?;

        let severity_key = severity_timestamp_key(alert.severity, id);
        self.by_severity.insert(severity_key, id.to_be_bytes())?;

        let source_type_key = format!("{}:{}:{:020}", alert.source, alert.alert_type.as_str(), id);
        self.by_source_type.insert(source_type_key.as_bytes(), id.to_be_bytes())?;

        if let Some(score) = alert.threat_score {
            let score_key = score_key(score, id);
            self.by_score.insert(score_key, id.to_be_bytes())?;
        }

        self.db.flush()?;
        Ok(alert)
    }

    pub fn get(&self, id: u64) -> Result<Option<Alert>> {
        match self.ids.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Overwrites a previously-stored alert (used by the Background
    /// Scorer to attach `processed_at`/`threat_score`/`correlations`
    /// after the fact) and refreshes the score index.
    pub fn update(&self, alert: &Alert) -> Result<()> {
        self.ids.insert(alert.id.to_be_bytes(), serde_json::to_vec(alert)?)?;
        if let Some(score) = alert.threat_score {
            let score_key = score_key(score, alert.id);
            self.by_score.insert(score_key, alert.id.to_be_bytes())?;
        }
        self.db.flush()?;
        Ok(())
    }

    /// Most recent `limit` alerts, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<Alert>> {
        let mut out = Vec::with_capacity(limit);
        for item in self.ids.iter().rev() {
            let (key, value) = item?;
            if key.as_ref() == COUNTER_KEY {
                continue;
            }
            out.push(serde_json::from_slice(&value)?);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// All alerts with `timestamp >= since` (assumes insertion order
    /// tracks timestamp order, as the edge nodes stream alerts live).
    pub fn since(&self, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<Alert>> {
        let mut out = Vec::new();
        for item in self.ids.iter().rev() {
            let (key, value) = item?;
            if key.as_ref() == COUNTER_KEY {
                continue;
            }
            let alert: Alert = serde_json::from_slice(&value)?;
            if alert.timestamp < since {
                break;
            }
            out.push(alert);
        }
        out.reverse();
        Ok(out)
    }

    pub fn count(&self) -> usize {
        self.ids.len().saturating_sub(1)
    }
}

fn decode_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

fn severity_timestamp_key(severity: Severity, id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(3 - severity as u8);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn score_key(score: f64, id: u64) -> Vec<u8> {
    let inverted = ((1.0 - score.clamp(0.0, 1.0)) * 1_000_000.0) as u32;
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&inverted.to_be_bytes());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentry_core::AlertType;

    fn sample(source: &str, severity: Severity) -> Alert {
        Alert {
            id: 0,
            source: source.to_string(),
            alert_type: AlertType::NetworkAnomaly,
            severity,
            title: "test".into(),
            description: "desc".into(),
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
    fn insert_assigns_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(dir.path()).unwrap();
        let a = store.insert(sample("edge-1", Severity::Low)).unwrap();
        let b = store.insert(sample("edge-1", Severity::High)).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[test]
    fn get_round_trips_stored_alert() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(dir.path()).unwrap();
        let stored = store.insert(sample("edge-1", Severity::Medium)).unwrap();
        let fetched = store.get(stored.id).unwrap().unwrap();
        assert_eq!(fetched.source, "edge-1");
    }

    #[test]
    fn recent_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(dir.path()).unwrap();
        store.insert(sample("a", Severity::Low)).unwrap();
        store.insert(sample("b", Severity::Low)).unwrap();
        let recent = store.recent(2).unwrap();
        assert_eq!(recent[0].source, "b");
        assert_eq!(recent[1].source, "a");
    }

    #[test]
    fn update_persists_threat_score() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(dir.path()).unwrap();
        let mut stored = store.insert(sample("a", Severity::Low)).unwrap();
        stored.threat_score = Some(0.75);
        store.update(&stored).unwrap();
        let fetched = store.get(stored.id).unwrap().unwrap();
        assert_eq!(fetched.threat_score, Some(0.75));
    }

    #[test]
    fn count_excludes_counter_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::open(dir.path()).unwrap();
        store.insert(sample("a", Severity::Low)).unwrap();
        store.insert(sample("b", Severity::Low)).unwrap();
        assert_eq!(store.count(), 2);
    }
}
