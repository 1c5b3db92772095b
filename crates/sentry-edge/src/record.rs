//! `LogRecord`: the tagged sum type yielded by the Log Reader (§3, §9
//! "dynamic object fields → tagged sum type"). Each variant is a
//! per-log-type record normalized from either the collector's
//! JSON-per-line encoding or its tab-separated fallback encoding.

use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogType {
    Conn,
    Dns,
    Http,
    Tls,
    Notice,
    Files,
    Weird,
}

impl LogType {
    pub fn file_name(self) -> &'static str {
        match self {
            LogType::Conn => "conn.log",
            LogType::Dns => "dns.log",
            LogType::Http => "http.log",
            LogType::Tls => "ssl.log",
            LogType::Notice => "notice.log",
            LogType::Files => "files.log",
            LogType::Weird => "weird.log",
        }
    }

    /// The ordered list of logs the Log Reader tails (§4.1), matching
    /// `network_monitor.py::NetworkMonitor.ZEEK_LOGS`.
    pub const ALL: [LogType; 7] = [
        LogType::Conn,
        LogType::Dns,
        LogType::Http,
        LogType::Tls,
        LogType::Notice,
        LogType::Files,
        LogType::Weird,
    ];
}

#[derive(Debug, Clone)]
pub struct ConnRecord {
    pub ts: DateTime<Utc>,
    pub uid: Option<String>,
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
}

#[derive(Debug, Clone)]
pub struct DnsRecord {
    pub uid: Option<String>,
    pub query: String,
    pub qtype_name: String,
}

#[derive(Debug, Clone)]
pub struct HttpRecord {
    pub uid: Option<String>,
    pub method: String,
    pub host: String,
    pub uri: String,
    pub status_code: u16,
}

#[derive(Debug, Clone)]
pub struct TlsRecord {
    pub uid: Option<String>,
    pub version: String,
    pub cipher: String,
    pub server_name: String,
    pub validation_status: String,
}

#[derive(Debug, Clone)]
pub struct NoticeRecord {
    pub uid: Option<String>,
    pub note: String,
    pub msg: String,
    pub sub: Option<String>,
    pub src_ip: Option<String>,
    pub src_port: Option<u16>,
    pub dest_ip: Option<String>,
    pub dest_port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct FilesRecord {
    pub uid: Option<String>,
    pub filename: String,
    pub mime_type: String,
    pub seen_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct WeirdRecord {
    pub uid: Option<String>,
    pub name: String,
    pub notice: bool,
}

#[derive(Debug, Clone)]
pub enum LogRecord {
    Conn(ConnRecord),
    Dns(DnsRecord),
    Http(HttpRecord),
    Tls(TlsRecord),
    Notice(NoticeRecord),
    Files(FilesRecord),
    Weird(WeirdRecord),
}

impl LogRecord {
    pub fn uid(&self) -> Option<&str> {
        match self {
            LogRecord::Conn(r) => r.uid.as_deref(),
            LogRecord::Dns(r) => r.uid.as_deref(),
            LogRecord::Http(r) => r.uid.as_deref(),
            LogRecord::Tls(r) => r.uid.as_deref(),
            LogRecord::Notice(r) => r.uid.as_deref(),
            LogRecord::Files(r) => r.uid.as_deref(),
            LogRecord::Weird(r) => r.uid.as_deref(),
        }
    }
}

fn get_str(v: &Value, keys: &[&str]) -> Option<String> {
    for k in keys {
        if let Some(s) = v.get(*k).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn get_u64(v: &Value, keys: &[&str]) -> u64 {
    for k in keys {
        if let Some(n) = v.get(*k).and_then(Value::as_u64) {
            return n;
        }
        if let Some(n) = v.get(*k).and_then(Value::as_f64) {
            return n as u64;
        }
    }
    0
}

fn get_f64(v: &Value, keys: &[&str]) -> f64 {
    for k in keys {
        if let Some(n) = v.get(*k).and_then(Value::as_f64) {
            return n;
        }
    }
    0.0
}

fn get_u16(v: &Value, keys: &[&str]) -> u16 {
    get_u64(v, keys) as u16
}

fn parse_ts(v: &Value) -> DateTime<Utc> {
    v.get("ts")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            v.get("ts")
                .and_then(Value::as_f64)
                .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
        })
        .unwrap_or_else(Utc::now)
}

/// Parse one non-empty, non-comment JSON line into a `LogRecord`,
/// normalizing the collector's dotted/prefixed field names to
/// canonical snake_case (`id.orig_h` → `src_ip`, etc). Returns `None`
/// on any required-field failure; callers drop the line (§3 LogRecord
/// invariant).
pub fn parse_json_line(log_type: LogType, line: &str) -> Option<LogRecord> {
    let v: Value = serde_json::from_str(line).ok()?;
    parse_json_value(log_type, &v)
}

fn parse_json_value(log_type: LogType, v: &Value) -> Option<LogRecord> {
    let uid = get_str(v, &["uid"]);
    match log_type {
        LogType::Conn => Some(LogRecord::Conn(ConnRecord {
            ts: parse_ts(v),
            uid,
            src_ip: get_str(v, &["id.orig_h", "src_ip"]).unwrap_or_default(),
            src_port: get_u16(v, &["id.orig_p", "src_port"]),
            dest_ip: get_str(v, &["id.resp_h", "dest_ip"]).unwrap_or_default(),
            dest_port: get_u16(v, &["id.resp_p", "dest_port"]),
            protocol: get_str(v, &["proto", "protocol"]).unwrap_or_default(),
            service: get_str(v, &["service"]).unwrap_or_default(),
            duration: get_f64(v, &["duration"]),
            orig_bytes: get_u64(v, &["orig_bytes"]),
            resp_bytes: get_u64(v, &["resp_bytes"]),
            conn_state: get_str(v, &["conn_state"]).unwrap_or_default(),
            history: get_str(v, &["history"]).unwrap_or_default(),
            orig_pkts: get_u64(v, &["orig_pkts"]),
            resp_pkts: get_u64(v, &["resp_pkts"]),
        })),
        LogType::Dns => Some(LogRecord::Dns(DnsRecord {
            uid,
            query: get_str(v, &["query"]).unwrap_or_default(),
            qtype_name: get_str(v, &["qtype_name"]).unwrap_or_default(),
        })),
        LogType::Http => Some(LogRecord::Http(HttpRecord {
            uid,
            method: get_str(v, &["method"]).unwrap_or_default(),
            host: get_str(v, &["host"]).unwrap_or_default(),
            uri: get_str(v, &["uri"]).unwrap_or_default(),
            status_code: get_u16(v, &["status_code"]),
        })),
        LogType::Tls => Some(LogRecord::Tls(TlsRecord {
            uid,
            version: get_str(v, &["version"]).unwrap_or_default(),
            cipher: get_str(v, &["cipher"]).unwrap_or_default(),
            server_name: get_str(v, &["server_name"]).unwrap_or_default(),
            validation_status: get_str(v, &["validation_status"]).unwrap_or_default(),
        })),
        LogType::Notice => {
            let note = get_str(v, &["note"])?;
            Some(LogRecord::Notice(NoticeRecord {
                uid,
                note,
                msg: get_str(v, &["msg"]).unwrap_or_default(),
                sub: get_str(v, &["sub"]),
                src_ip: get_str(v, &["id.orig_h", "src"]),
                src_port: v.get("id.orig_p").and_then(Value::as_u64).map(|p| p as u16),
                dest_ip: get_str(v, &["id.resp_h", "dst"]),
                dest_port: v.get("id.resp_p").and_then(Value::as_u64).map(|p| p as u16),
            }))
        }
        LogType::Files => Some(LogRecord::Files(FilesRecord {
            uid,
            filename: get_str(v, &["filename"]).unwrap_or_default(),
            mime_type: get_str(v, &["mime_type"]).unwrap_or_default(),
            seen_bytes: get_u64(v, &["seen_bytes"]),
        })),
        LogType::Weird => {
            let name = get_str(v, &["name"])?;
            Some(LogRecord::Weird(WeirdRecord {
                uid,
                name,
                notice: v.get("notice").and_then(Value::as_bool).unwrap_or(false),
            }))
        }
    }
}

/// Fallback tab-separated parser, conn records only (§4.1), matching
/// `network_monitor.py::ZeekLogParser._parse_tsv`'s exact column
/// indices for the conn log.
pub fn parse_conn_tsv(line: &str) -> Option<LogRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 17 {
        return None;
    }
    let field = |i: usize| -> &str { fields.get(i).copied().unwrap_or("-") };
    let opt_str = |i: usize| -> Option<String> {
        let s = field(i);
        if s == "-" || s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    };
    let num = |i: usize| -> f64 { field(i).parse().unwrap_or(0.0) };

    Some(LogRecord::Conn(ConnRecord {
        ts: DateTime::from_timestamp(field(0).parse::<f64>().unwrap_or(0.0) as i64, 0)
            .unwrap_or_else(Utc::now),
        uid: opt_str(1),
        src_ip: field(2).to_string(),
        src_port: num(3) as u16,
        dest_ip: field(4).to_string(),
        dest_port: num(5) as u16,
        protocol: field(6).to_string(),
        service: field(7).to_string(),
        duration: num(8),
        orig_bytes: num(9) as u64,
        resp_bytes: num(10) as u64,
        conn_state: field(11).to_string(),
        history: field(15).to_string(),
        orig_pkts: num(16) as u64,
        resp_pkts: fields.get(18).and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0) as u64,
    }))
}

/// Parse a single line read from a Zeek-style log, auto-detecting
/// structured-object vs tab-separated encoding (§4.1).
pub fn parse_line(log_type: LogType, line: &str) -> Option<LogRecord> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if let Some(record) = parse_json_line(log_type, line) {
        return Some(record);
    }
    if log_type == LogType::Conn {
        return parse_conn_tsv(line);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_conn_record_normalizes_dotted_fields() {
        let line = r#"{"ts": 1700000000.0, "uid": "U1", "id.orig_h": "10.0.0.1", "id.orig_p": 5555, "id.resp_h": "45.33.32.156", "id.resp_p": 443, "proto": "tcp", "service": "ssl", "duration": 2.0, "orig_bytes": 5000000, "resp_bytes": 1000, "conn_state": "SF", "history": "ShADadFf", "orig_pkts": 10, "resp_pkts": 8}"#;
        let rec = parse_line(LogType::Conn, line).expect("parses");
        match rec {
            LogRecord::Conn(c) => {
                assert_eq!(c.uid.as_deref(), Some("U1"));
                assert_eq!(c.src_ip, "10.0.0.1");
                assert_eq!(c.dest_port, 443);
                assert_eq!(c.orig_bytes, 5_000_000);
            }
            _ => panic!("expected conn record"),
        }
    }

    #[test]
    fn tsv_and_json_conn_agree_on_normalized_fields() {
        let tsv = "1700000000.0\tU1\t10.0.0.1\t5555\t45.33.32.156\t443\ttcp\tssl\t2.0\t5000000\t1000\tSF\t-\t-\t-\tShADadFf\t10\t-\t8";
        let rec = parse_conn_tsv(tsv).expect("parses tsv");
        match rec {
            LogRecord::Conn(c) => {
                assert_eq!(c.uid.as_deref(), Some("U1"));
                assert_eq!(c.src_ip, "10.0.0.1");
                assert_eq!(c.dest_port, 443);
                assert_eq!(c.orig_bytes, 5_000_000);
                assert_eq!(c.conn_state, "SF");
                assert_eq!(c.history, "ShADadFf");
            }
            _ => panic!("expected conn record"),
        }
    }

    #[test]
    fn malformed_notice_without_note_is_dropped() {
        let line = r#"{"uid": "U1", "msg": "hello"}"#;
        assert!(parse_line(LogType::Notice, line).is_none());
    }

    #[test]
    fn comment_and_blank_lines_are_dropped() {
        assert!(parse_line(LogType::Conn, "#fields ts uid").is_none());
        assert!(parse_line(LogType::Conn, "   ").is_none());
    }
}
