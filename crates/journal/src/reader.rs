use crate::error::{JournalError, Result};
use crate::writer::{normalize_object, UNKNOWN};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use threadmap_protocol::LogEntry;

/// Entries of one file plus how many non-blank lines were not JSON objects.
#[derive(Debug, Default)]
pub struct LogScan {
    pub entries: Vec<LogEntry>,
    pub malformed: usize,
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Lenient view of one log object: other writers append to the same day files, so
/// fields of the wrong type are filled in rather than rejected.
fn entry_from_object(mut object: Map<String, Value>) -> LogEntry {
    let mut take = |key: &str| object.remove(key).unwrap_or(Value::Null);
    let ts = take("ts");
    let agent = take("agent");
    let session = take("session");
    let action = take("action");
    let details = take("details");
    let extra = take("extra");

    LogEntry {
        ts: scalar_text(Some(&ts)).unwrap_or_default(),
        agent: scalar_text(Some(&agent)).unwrap_or_else(|| UNKNOWN.to_string()),
        session: scalar_text(Some(&session)),
        action: scalar_text(Some(&action)).unwrap_or_else(|| UNKNOWN.to_string()),
        details: normalize_object(details),
        extra: normalize_object(extra),
    }
}

pub fn parse_lines(text: &str) -> LogScan {
    let mut scan = LogScan::default();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(object)) => scan.entries.push(entry_from_object(object)),
            Ok(_) => {
                log::debug!("Skipping log line that is not a JSON object");
                scan.malformed += 1;
            }
            Err(e) => {
                log::debug!("Skipping malformed log line: {e}");
                scan.malformed += 1;
            }
        }
    }
    scan
}

/// Parse one log file; a missing file reads as empty.
pub fn read_log_file(path: &Path) -> Result<LogScan> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_lines(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LogScan::default()),
        Err(e) => Err(JournalError::read(path, e)),
    }
}

/// `*.jsonl` files in `logs_dir`, oldest day first. A missing directory has none.
pub fn log_files(logs_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(logs_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(JournalError::read(logs_dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| JournalError::read(logs_dir, e))?.path();
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(".jsonl"))
            .unwrap_or(false);
        if is_log && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Last `n` well-formed entries of a day file, oldest first.
pub fn tail(day_file: &Path, n: usize) -> Result<Vec<LogEntry>> {
    let mut entries = read_log_file(day_file)?.entries;
    let skip = entries.len().saturating_sub(n);
    Ok(entries.split_off(skip))
}

/// Up to `limit` entries across all day files, newest first.
pub fn read_recent(logs_dir: &Path, limit: usize) -> Result<Vec<LogEntry>> {
    let mut recent = Vec::new();
    for path in log_files(logs_dir)?.into_iter().rev() {
        if recent.len() >= limit {
            break;
        }
        let scan = match read_log_file(&path) {
            Ok(scan) => scan,
            Err(e) => {
                log::warn!("Skipping unreadable log: {e}");
                continue;
            }
        };
        let wanted = limit - recent.len();
        recent.extend(scan.entries.into_iter().rev().take(wanted));
    }
    Ok(recent)
}
