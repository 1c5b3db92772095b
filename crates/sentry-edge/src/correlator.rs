//! Correlator (§4.2): joins auxiliary log records to connection
//! records via UID and emits `EnrichedEvent`s. Grounded on
//! `network_monitor.py::ConnectionContext` /
//! `NetworkMonitor._update_connection_context` /
//! `NetworkMonitor._cleanup_cache`.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::record::{ConnRecord, DnsRecord, FilesRecord, HttpRecord, LogRecord, NoticeRecord, TlsRecord};

const AUX_CAP: usize = 50;

/// Per-UID accumulation of auxiliary records (§3 FlowContext).
#[derive(Debug, Clone, Default)]
pub struct FlowContext {
    pub dns_queries: VecDeque<DnsRecord>,
    pub http_requests: VecDeque<HttpRecord>,
    pub tls: Option<TlsRecord>,
    pub notices: VecDeque<NoticeRecord>,
    pub files: VecDeque<FilesRecord>,
}

impl FlowContext {
    fn push_bounded<T>(queue: &mut VecDeque<T>, item: T) {
        if queue.len() >= AUX_CAP {
            queue.pop_front();
        }
        queue.push_back(item);
    }

    fn apply(&mut self, record: LogRecord) {
        match record {
            LogRecord::Dns(r) => Self::push_bounded(&mut self.dns_queries, r),
            LogRecord::Http(r) => Self::push_bounded(&mut self.http_requests, r),
            LogRecord::Tls(r) => self.tls = Some(r), // latest only, overwrite (§3)
            LogRecord::Notice(r) => Self::push_bounded(&mut self.notices, r),
            LogRecord::Files(r) => Self::push_bounded(&mut self.files, r),
            LogRecord::Conn(_) | LogRecord::Weird(_) => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationCategory {
    Short,
    Medium,
    Long,
    VeryLong,
}

impl DurationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DurationCategory::Short => "short",
            DurationCategory::Medium => "medium",
            DurationCategory::Long => "long",
            DurationCategory::VeryLong => "very_long",
        }
    }

    fn from_duration(seconds: f64) -> Self {
        if seconds < 1.0 {
            DurationCategory::Short
        } else if seconds < 60.0 {
            DurationCategory::Medium
        } else if seconds < 3600.0 {
            DurationCategory::Long
        } else {
            DurationCategory::VeryLong
        }
    }
}

/// The Correlator's output for a `conn` record (§3 EnrichedEvent).
#[derive(Debug, Clone)]
pub struct EnrichedEvent {
    pub ts: DateTime<Utc>,
    pub src_ip: String,
    pub src_port: u16,
    pub dest_ip: String,
    pub dest_port: u16,
    pub protocol: String,
    pub service: String,
    pub duration: f64,
    pub orig_bytes: u64,
    pub resp_bytes: u64,
    pub conn_state: String,
    pub history: String,
    pub orig_pkts: u64,
    pub resp_pkts: u64,

    pub bytes_ratio: f64,
    pub pkt_ratio: f64,
    pub total_bytes: u64,
    pub duration_category: DurationCategory,

    pub flow: FlowContext,
    pub has_dns: bool,
    pub has_http: bool,
    pub has_ssl: bool,
    pub has_notices: bool,
}

/// Sentinel for ratios whose denominator is zero — never NaN (§3).
pub const RATIO_SENTINEL: f64 = 1.0e6;

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        if numerator == 0 {
            0.0
        } else {
            RATIO_SENTINEL
        }
    } else {
        numerator as f64 / denominator as f64
    }
}

fn enrich(conn: ConnRecord, flow: FlowContext) -> EnrichedEvent {
    let has_dns = !flow.dns_queries.is_empty();
    let has_http = !flow.http_requests.is_empty();
    let has_ssl = flow.tls.is_some();
    let has_notices = !flow.notices.is_empty();

    EnrichedEvent {
        bytes_ratio: ratio(conn.orig_bytes, conn.resp_bytes),
        pkt_ratio: ratio(conn.orig_pkts, conn.resp_pkts),
        total_bytes: conn.orig_bytes + conn.resp_bytes,
        duration_category: DurationCategory::from_duration(conn.duration),
        ts: conn.ts,
        src_ip: conn.src_ip,
        src_port: conn.src_port,
        dest_ip: conn.dest_ip,
        dest_port: conn.dest_port,
        protocol: conn.protocol,
        service: conn.service,
        duration: conn.duration,
        orig_bytes: conn.orig_bytes,
        resp_bytes: conn.resp_bytes,
        conn_state: conn.conn_state,
        history: conn.history,
        orig_pkts: conn.orig_pkts,
        resp_pkts: conn.resp_pkts,
        flow,
        has_dns,
        has_http,
        has_ssl,
        has_notices,
    }
}

/// Hour-of-day/weekday/second-of-minute features (§4.3 features 11-13),
/// normalized and divided by their ranges.
pub fn time_features(ts: DateTime<Utc>) -> (f64, f64, f64) {
    let hour = ts.hour() as f64 / 24.0;
    let weekday = ts.weekday().num_days_from_monday() as f64 / 6.0;
    let second = ts.second() as f64 / 59.0;
    (hour, weekday, second)
}

/// Owns the UID → FlowContext map. One instance per edge process,
/// driven by a single task (§9: "global mutable state" → owning task).
pub struct Correlator {
    contexts: HashMap<String, FlowContext>,
    insertion_order: VecDeque<String>,
    cap: usize,
}

impl Correlator {
    pub fn new(cap: usize) -> Self {
        Self {
            contexts: HashMap::new(),
            insertion_order: VecDeque::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    fn touch(&mut self, uid: &str) {
        if !self.contexts.contains_key(uid) {
            self.insertion_order.push_back(uid.to_string());
        }
    }

    /// Evict the oldest 20% of entries, in insertion order (§3, §4.2).
    fn evict_if_needed(&mut self) {
        if self.contexts.len() <= self.cap {
            return;
        }
        let evict_count = (self.contexts.len() as f64 * 0.2).ceil() as usize;
        for _ in 0..evict_count {
            if let Some(uid) = self.insertion_order.pop_front() {
                self.contexts.remove(&uid);
            } else {
                break;
            }
        }
    }

    /// Feed one `LogRecord` into the correlator. Returns `Some(event)`
    /// for `conn` records; all other types update `FlowContext` only.
    pub fn ingest(&mut self, record: LogRecord) -> Option<EnrichedEvent> {
        match record {
            LogRecord::Conn(conn) => {
                let flow = match &conn.uid {
                    Some(uid) => self.contexts.get(uid).cloned().unwrap_or_default(),
                    None => FlowContext::default(),
                };
                Some(enrich(conn, flow))
            }
            other => {
                if let Some(uid) = other.uid().map(str::to_string) {
                    self.touch(&uid);
                    let entry = self.contexts.entry(uid).or_default();
                    entry.apply(other);
                    self.evict_if_needed();
                }
                None
            }
        }
    }
}
