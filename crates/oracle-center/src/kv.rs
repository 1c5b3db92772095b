//! Abuse safeguards (§4.7): a content-dedupe window plus a global
//! per-minute rate limit, applied before an alert is ever persisted.
//! Grounded on `examples/original_source/oracle/src/oracle_service.py`'s
//! `check_abuse_safeguards`, which hashed `source:alert_type:description`
//! with MD5 and tracked a Redis key per minute-of-hour. `dashmap` plays
//! the role Redis played there, in-process.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use sentry_core::Alert;

/// Default dedupe TTL, used when no override comes from config.
pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_secs(60);
/// Default per-minute ceiling, used when no override comes from config.
pub const DEFAULT_GLOBAL_MINUTE_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Duplicate,
    RateLimited,
}

struct MinuteCounter {
    minute: AtomicU32,
    count: AtomicU32,
}

/// Tracks recently-seen alert content hashes and a rolling per-minute
/// counter. Safe to share across ingestion tasks without an external
/// lock — every mutation is a single `DashMap`/atomic operation.
pub struct AbuseSafeguards {
    seen: DashMap<String, Instant>,
    start: Instant,
    minute: MinuteCounter,
    dedupe_window: Duration,
    minute_limit: u32,
}

impl AbuseSafeguards {
    pub fn new(dedupe_window: Duration, minute_limit: u32) -> Self {
        Self {
            seen: DashMap::new(),
            start: Instant::now(),
            minute: MinuteCounter { minute: AtomicU32::new(0), count: AtomicU32::new(0) },
            dedupe_window,
            minute_limit,
        }
    }

    fn current_minute(&self) -> u32 {
        (self.start.elapsed().as_secs() / 60) as u32
    }

    /// Checks and, if permitted, records the alert. Returns `Ok(())`
    /// when the alert may proceed, or the reason it was rejected.
    ///
    /// Mirrors §4.7's step order literally: the per-minute counter is
    /// incremented unconditionally before either the duplicate or the
    /// ceiling check, so a duplicate still consumes rate-limit budget.
    pub fn check_and_record(&self, alert: &Alert) -> Result<(), RejectReason> {
        let now = self.current_minute();
        let prev = self.minute.minute.swap(now, Ordering::SeqCst);
        if prev != now {
            self.minute.count.store(0, Ordering::SeqCst);
        }

        let hash = content_hash(alert);
        let is_duplicate =
            self.seen.get(&hash).map(|seen_at| seen_at.elapsed() < self.dedupe_window).unwrap_or(false);

        let count = self.minute.count.fetch_add(1, Ordering::SeqCst) + 1;

        if is_duplicate {
            return Err(RejectReason::Duplicate);
        }
        if count > self.minute_limit {
            return Err(RejectReason::RateLimited);
        }

        self.seen.insert(hash, Instant::now());
        self.sweep_expired();
        Ok(())
    }

    fn sweep_expired(&self) {
        self.seen.retain(|_, seen_at| seen_at.elapsed() < self.dedupe_window * 2);
    }
}

impl Default for AbuseSafeguards {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUPE_WINDOW, DEFAULT_GLOBAL_MINUTE_LIMIT)
    }
}

fn content_hash(alert: &Alert) -> String {
    format!("{:x}", md5::compute(alert.dedupe_content()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentry_core::{AlertType, Severity};

    fn sample(description: &str) -> Alert {
        Alert {
            id: 0,
            source: "edge-1".into(),
            alert_type: AlertType::NetworkAnomaly,
            severity: Severity::Low,
            title: "t".into(),
            description: description.to_string(),
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
    fn first_occurrence_is_accepted() {
        let guard = AbuseSafeguards::default();
        assert_eq!(guard.check_and_record(&sample("a")), Ok(()));
    }

    #[test]
    fn identical_content_within_window_is_rejected_as_duplicate() {
        let guard = AbuseSafeguards::default();
        guard.check_and_record(&sample("a")).unwrap();
        assert_eq!(guard.check_and_record(&sample("a")), Err(RejectReason::Duplicate));
    }

    #[test]
    fn distinct_content_is_not_deduped() {
        let guard = AbuseSafeguards::default();
        guard.check_and_record(&sample("a")).unwrap();
        assert_eq!(guard.check_and_record(&sample("b")), Ok(()));
    }

    #[test]
    fn exceeding_the_minute_limit_is_rate_limited() {
        let guard = AbuseSafeguards::default();
        for i in 0..DEFAULT_GLOBAL_MINUTE_LIMIT {
            guard.check_and_record(&sample(&format!("msg-{i}"))).unwrap();
        }
        assert_eq!(
            guard.check_and_record(&sample("one-too-many")),
            Err(RejectReason::RateLimited)
        );
    }

    #[test]
    fn duplicate_within_window_still_consumes_rate_limit_budget() {
        let guard = AbuseSafeguards::new(Duration::from_secs(60), 2);
        guard.check_and_record(&sample("a")).unwrap();
        assert_eq!(guard.check_and_record(&sample("a")), Err(RejectReason::Duplicate));
        assert_eq!(guard.check_and_record(&sample("b")), Err(RejectReason::RateLimited));
    }

    #[test]
    fn custom_limits_are_honored() {
        let guard = AbuseSafeguards::new(Duration::from_millis(10), 1);
        assert_eq!(guard.check_and_record(&sample("a")), Ok(()));
        assert_eq!(guard.check_and_record(&sample("b")), Err(RejectReason::RateLimited));
    }
}
