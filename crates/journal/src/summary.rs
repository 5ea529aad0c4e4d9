use crate::error::{JournalError, Result};
use crate::reader::{log_files, read_log_file, LogScan};
use crate::writer::UNKNOWN;
use std::path::Path;
use threadmap_protocol::{write_json_atomic, LogEntry, LogSummary, RepoLayout};

/// Fold entries into a running summary.
pub fn tally(summary: &mut LogSummary, scan: &LogScan) {
    summary.malformed_lines += scan.malformed;
    for entry in &scan.entries {
        record(summary, entry);
    }
}

fn record(summary: &mut LogSummary, entry: &LogEntry) {
    summary.total_entries += 1;
    *summary.by_agent.entry(label(&entry.agent)).or_default() += 1;
    *summary.by_action.entry(label(&entry.action)).or_default() += 1;

    if entry.ts.is_empty() {
        return;
    }
    if summary.first_ts.as_deref().map_or(true, |first| entry.ts.as_str() < first) {
        summary.first_ts = Some(entry.ts.clone());
    }
    if summary.last_ts.as_deref().map_or(true, |last| entry.ts.as_str() > last) {
        summary.last_ts = Some(entry.ts.clone());
    }
}

fn label(value: &str) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

/// Summarize every `*.jsonl` file in `logs_dir`. `Ok(None)` when the directory is absent.
pub fn summarize_dir(logs_dir: &Path) -> Result<Option<LogSummary>> {
    if !logs_dir.is_dir() {
        return Ok(None);
    }
    let mut summary = LogSummary::default();
    for path in log_files(logs_dir)? {
        match read_log_file(&path) {
            Ok(scan) => tally(&mut summary, &scan),
            Err(e) => log::warn!("Skipping unreadable log: {e}"),
        }
    }
    Ok(Some(summary))
}

/// Summarize the repository's logs and write `summary.json` next to them.
pub fn summarize(layout: &RepoLayout) -> Result<Option<LogSummary>> {
    let Some(summary) = summarize_dir(&layout.logs_dir())? else {
        return Ok(None);
    };
    let path = layout.summary_path();
    write_json_atomic(&path, &summary).map_err(|e| JournalError::append(&path, e))?;
    log::debug!(
        "Summarized {} log entries into {}",
        summary.total_entries,
        path.display()
    );
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_lines;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::fs;

    #[test]
    fn counts_by_agent_and_action_with_unknown_fallback() {
        let text = r#"{"ts":"2025-01-02T00:00:00Z","agent":"a","action":"start"}
{"ts":"2025-01-01T00:00:00Z","agent":"","action":"start"}
{"agent":"a","action":""}
garbage
"#;
        let mut summary = LogSummary::default();
        tally(&mut summary, &parse_lines(text));

        assert_eq!(summary.total_entries, 3);
        assert_eq!(summary.malformed_lines, 1);
        assert_eq!(
            summary.by_agent,
            BTreeMap::from([("a".to_string(), 2), ("unknown".to_string(), 1)])
        );
        assert_eq!(
            summary.by_action,
            BTreeMap::from([("start".to_string(), 2), ("unknown".to_string(), 1)])
        );
        assert_eq!(summary.first_ts.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(summary.last_ts.as_deref(), Some("2025-01-02T00:00:00Z"));
    }

    #[test]
    fn mistyped_fields_are_counted_not_dropped() {
        let text = r#"{"ts":"t1","agent":null,"action":"a"}
{"ts":"t2","agent":"a","action":"b","details":"plain"}
{"ts":"t3","agent":"a","session":7,"action":"c"}
"#;
        let mut summary = LogSummary::default();
        tally(&mut summary, &parse_lines(text));

        assert_eq!(summary.total_entries, 3);
        assert_eq!(summary.malformed_lines, 0);
        assert_eq!(
            summary.by_agent,
            BTreeMap::from([("a".to_string(), 2), ("unknown".to_string(), 1)])
        );
        assert_eq!(summary.last_ts.as_deref(), Some("t3"));
    }

    #[test]
    fn missing_logs_dir_is_none_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RepoLayout::new(dir.path());
        assert!(summarize(&layout).unwrap().is_none());
        assert!(!layout.summary_path().exists());
    }

    #[test]
    fn writes_summary_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RepoLayout::new(dir.path());
        fs::create_dir_all(layout.logs_dir()).unwrap();
        fs::write(
            layout.logs_dir().join("2025-01-01.log.jsonl"),
            "{\"ts\":\"t\",\"agent\":\"x\",\"action\":\"y\"}\n",
        )
        .unwrap();

        let summary = summarize(&layout).unwrap().unwrap();
        let on_disk: LogSummary = threadmap_protocol::read_json(&layout.summary_path())
            .unwrap()
            .unwrap();
        assert_eq!(on_disk, summary);
        assert_eq!(summary.total_entries, 1);

        // summary.json itself is never counted.
        let again = summarize(&layout).unwrap().unwrap();
        assert_eq!(again.total_entries, 1);
    }
}
