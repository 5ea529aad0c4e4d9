use crate::error::{JournalError, Result};
use crate::reader;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use fs2::FileExt;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use threadmap_protocol::{LogEntry, RepoLayout};

pub const UNKNOWN: &str = "unknown";
pub const LOG_FILE_SUFFIX: &str = ".log.jsonl";

/// `YYYY-MM-DD.log.jsonl` for a UTC day.
pub fn day_file_name(day: NaiveDate) -> String {
    format!("{}{LOG_FILE_SUFFIX}", day.format("%Y-%m-%d"))
}

/// Objects pass through, null becomes `{}`, anything else is wrapped as `{"value": v}`.
pub fn normalize_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn or_unknown(value: &str) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

/// Appends one JSON line per action to the current UTC day's log file.
#[derive(Debug, Clone)]
pub struct AgentLogger {
    agent: String,
    logs_dir: PathBuf,
}

impl AgentLogger {
    pub fn new(layout: &RepoLayout, agent: impl Into<String>) -> Self {
        Self::in_dir(layout.logs_dir(), agent)
    }

    pub fn in_dir(logs_dir: impl Into<PathBuf>, agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            logs_dir: logs_dir.into(),
        }
    }

    pub fn day_file(&self) -> PathBuf {
        self.logs_dir.join(day_file_name(Utc::now().date_naive()))
    }

    /// Build the normalized entry that [`AgentLogger::log`] would write.
    pub fn entry(
        &self,
        session: Option<&str>,
        action: &str,
        details: Value,
        extra: Value,
        at: DateTime<Utc>,
    ) -> LogEntry {
        LogEntry {
            ts: at.to_rfc3339_opts(SecondsFormat::Micros, true),
            agent: or_unknown(&self.agent),
            session: session.map(str::to_string),
            action: or_unknown(action),
            details: normalize_object(details),
            extra: normalize_object(extra),
        }
    }

    /// Best-effort append: failures are reported through the `log` facade only.
    pub fn log(&self, session: Option<&str>, action: &str, details: Value, extra: Value) {
        if let Err(e) = self.try_log(session, action, details, extra) {
            log::warn!("Dropping log entry for agent {}: {e}", self.agent);
        }
    }

    pub fn try_log(
        &self,
        session: Option<&str>,
        action: &str,
        details: Value,
        extra: Value,
    ) -> Result<LogEntry> {
        let now = Utc::now();
        let entry = self.entry(session, action, details, extra, now);
        let path = self.logs_dir.join(day_file_name(now.date_naive()));
        self.append(&path, &entry)?;
        Ok(entry)
    }

    /// Stage the line in a temp file, then copy it into the day file under an
    /// exclusive advisory lock.
    fn append(&self, path: &Path, entry: &LogEntry) -> Result<()> {
        std::fs::create_dir_all(&self.logs_dir)
            .map_err(|e| JournalError::append(&self.logs_dir, e))?;

        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut staged =
            stage_line(&self.logs_dir, &line).map_err(|e| JournalError::append(path, e))?;

        let mut day_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| JournalError::append(path, e))?;
        day_file
            .lock_exclusive()
            .map_err(|e| JournalError::append(path, e))?;
        let copied = std::io::copy(staged.as_file_mut(), &mut day_file)
            .and_then(|_| day_file.flush());
        let _ = day_file.unlock();
        copied.map_err(|e| JournalError::append(path, e))
    }

    /// Last `n` well-formed entries of today's file.
    pub fn tail(&self, n: usize) -> Result<Vec<LogEntry>> {
        reader::tail(&self.day_file(), n)
    }
}

fn stage_line(dir: &Path, line: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new().prefix("logtmp").tempfile_in(dir)?;
    staged.write_all(line)?;
    staged.flush()?;
    staged.seek(SeekFrom::Start(0))?;
    Ok(staged)
}
