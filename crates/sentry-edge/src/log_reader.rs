//! Log Reader (§4.1): tails the seven Zeek logs from the active log
//! directory, tracking a byte offset per file and detecting log
//! rotation. Grounded on `network_monitor.py`
//! (`NetworkMonitor._find_zeek_log_dir`, `_tail_all_logs`,
//! `_process_log_file`).

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::record::{parse_line, LogRecord, LogType};

/// Poll interval between sweeps over all seven logs (§4.1).
pub const POLL_INTERVAL: Duration = Duration::from_millis(300);
/// Backoff applied after an I/O error on a single log file (§4.1).
pub const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// The directories searched for an active Zeek log set, in priority
/// order (§4.1 Glossary).
pub const ZEEK_LOG_DIRS: &[&str] = &[
    "/opt/zeek/logs/current",
    "/opt/zeek/logs",
    "/app/data/zeek/current",
    "/app/data/zeek",
    "/var/log/zeek/current",
    "/var/log/zeek",
];

/// Pick the first configured directory that exists and already
/// contains at least one `.log` file; otherwise create the first
/// candidate so the reader has somewhere to watch (§4.1).
pub fn discover_log_dir() -> PathBuf {
    for dir in ZEEK_LOG_DIRS {
        let path = Path::new(dir);
        if path.is_dir() {
            let has_log = std::fs::read_dir(path)
                .map(|mut entries| {
                    entries.any(|e| {
                        e.ok()
                            .map(|e| e.path().extension().map(|ext| ext == "log").unwrap_or(false))
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false);
            if has_log {
                return path.to_path_buf();
            }
        }
    }
    let fallback = PathBuf::from(ZEEK_LOG_DIRS[0]);
    if let Err(err) = std::fs::create_dir_all(&fallback) {
        warn!(%err, path = %fallback.display(), "failed to create fallback zeek log directory");
    }
    fallback
}

struct FileState {
    offset: u64,
}

/// Tails all seven Zeek logs under one directory, tracking a byte
/// offset per file and resetting on rotation (file shrinks).
pub struct LogReader {
    log_dir: PathBuf,
    positions: HashMap<PathBuf, FileState>,
}

impl LogReader {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            positions: HashMap::new(),
        }
    }

    /// One sweep over all seven logs, returning every parsed record
    /// found since the last sweep plus whether any file read failed
    /// (callers back off on `true` rather than polling immediately
    /// again, §4.1).
    pub fn poll_once(&mut self) -> (Vec<LogRecord>, bool) {
        let mut out = Vec::new();
        let mut had_error = false;
        for log_type in LogType::ALL {
            let path = self.log_dir.join(log_type.file_name());
            if !path.exists() {
                continue;
            }
            match self.read_new_lines(&path) {
                Ok(lines) => {
                    for line in lines {
                        if let Some(record) = parse_line(log_type, &line) {
                            out.push(record);
                        }
                    }
                }
                Err(err) => {
                    error!(%err, path = %path.display(), "log read error, will retry after backoff");
                    had_error = true;
                }
            }
        }
        (out, had_error)
    }

    fn read_new_lines(&mut self, path: &Path) -> std::io::Result<Vec<String>> {
        let metadata = std::fs::metadata(path)?;
        let size = metadata.len();

        let state = self.positions.entry(path.to_path_buf()).or_insert(FileState { offset: 0 });
        if size < state.offset {
            info!(path = %path.display(), "log rotation detected, resetting offset");
            state.offset = 0;
        }

        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(state.offset))?;
        let mut buf = String::new();
        let read = file.read_to_string(&mut buf)?;

        if read == 0 {
            return Ok(Vec::new());
        }

        // Keep any trailing partial line (no final newline yet) unread.
        let complete_len = buf.rfind('\n').map(|i| i + 1).unwrap_or(0);
        state.offset += complete_len as u64;

        let lines = buf[..complete_len].lines().map(str::to_string).collect();
        debug!(path = %path.display(), bytes = complete_len, "read new log bytes");
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn tracks_offset_across_polls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conn.log");
        std::fs::write(&path, "line1\nline2\n").unwrap();

        let mut reader = LogReader::new(dir.path());
        let first = reader.read_new_lines(&path).unwrap();
        assert_eq!(first, vec!["line1", "line2"]);

        let second = reader.read_new_lines(&path).unwrap();
        assert!(second.is_empty());

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "line3").unwrap();
        let third = reader.read_new_lines(&path).unwrap();
        assert_eq!(third, vec!["line3"]);
    }

    #[test]
    fn rotation_resets_offset_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conn.log");
        std::fs::write(&path, "line1\nline2\nline3\n").unwrap();

        let mut reader = LogReader::new(dir.path());
        reader.read_new_lines(&path).unwrap();

        std::fs::write(&path, "fresh1\n").unwrap();
        let after_rotation = reader.read_new_lines(&path).unwrap();
        assert_eq!(after_rotation, vec!["fresh1"]);
    }

    #[test]
    fn incomplete_trailing_line_is_not_consumed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conn.log");
        std::fs::write(&path, "line1\npartial").unwrap();

        let mut reader = LogReader::new(dir.path());
        let lines = reader.read_new_lines(&path).unwrap();
        assert_eq!(lines, vec!["line1"]);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, " rest").unwrap();
        let rest = reader.read_new_lines(&path).unwrap();
        assert_eq!(rest, vec!["partial rest"]);
    }

    #[test]
    fn poll_once_skips_logs_that_do_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = LogReader::new(dir.path());
        let (records, had_error) = reader.poll_once();
        assert!(records.is_empty());
        assert!(!had_error);
    }
}
