//! # Threadmap protocol
//!
//! Document types shared by the indexer, the journal and the CLI, plus the
//! repository layout every component resolves its paths from.
//!
//! ```text
//! .github/copilot/
//!     ├── contexts/*.md              session context files (input)
//!     ├── contexts/thread-map.json   committed relationship map (optional)
//!     ├── index.json                 IndexDocument (default output)
//!     └── runtime/
//!            ├── index.json          IndexDocument (refresh output)
//!            ├── last_run.json       LastRun
//!            ├── thread-map.inferred.json
//!            └── logs/
//!                   ├── YYYY-MM-DD.log.jsonl   LogEntry per line
//!                   └── summary.json           LogSummary
//! ```

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub mod paths;

pub use paths::RepoLayout;

/// Value of `generated_by` in every artifact the indexer writes.
pub const GENERATED_BY: &str = "threadmap index";

/// Strength tier of a relationship between two threads.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    DirectlyRelated,
    OftenRelated,
    OccasionallyRelated,
}

impl RelationType {
    /// All tiers in priority order (strongest first).
    pub const ALL: [RelationType; 3] = [
        RelationType::DirectlyRelated,
        RelationType::OftenRelated,
        RelationType::OccasionallyRelated,
    ];

    pub fn weight(self) -> f64 {
        match self {
            RelationType::DirectlyRelated => 1.0,
            RelationType::OftenRelated => 0.6,
            RelationType::OccasionallyRelated => 0.3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::DirectlyRelated => "directly_related",
            RelationType::OftenRelated => "often_related",
            RelationType::OccasionallyRelated => "occasionally_related",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RelationType::ALL
            .into_iter()
            .find(|rel| rel.as_str() == s)
            .ok_or_else(|| format!("unknown relation type '{s}'"))
    }
}

/// One parsed session context file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub primary_thread: Option<String>,
    #[serde(default)]
    pub related_threads: Vec<String>,
    pub status: Option<String>,
    pub last_message_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadEdge {
    pub to: String,
    #[serde(rename = "type")]
    pub relation: RelationType,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadNode {
    pub name: String,
    pub edges: Vec<ThreadEdge>,
    pub recommended_expansion: Vec<String>,
}

/// Where the thread relationships of an index came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ThreadsSource {
    /// `.github/copilot/contexts/thread-map.json`
    CommittedMap,
    /// A legacy relationships file, recorded by its repository-relative path.
    LegacyFile(String),
    InferredFromSessions,
    Unknown,
}

impl From<String> for ThreadsSource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "committed_map" => ThreadsSource::CommittedMap,
            "inferred_from_sessions" => ThreadsSource::InferredFromSessions,
            "unknown" | "" => ThreadsSource::Unknown,
            _ => ThreadsSource::LegacyFile(value),
        }
    }
}

impl From<ThreadsSource> for String {
    fn from(value: ThreadsSource) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ThreadsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadsSource::CommittedMap => f.write_str("committed_map"),
            ThreadsSource::LegacyFile(path) => f.write_str(path),
            ThreadsSource::InferredFromSessions => f.write_str("inferred_from_sessions"),
            ThreadsSource::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub threads_source: ThreadsSource,
    pub generated_at: String,
    pub generated_by: String,
}

/// Combined index of sessions and the thread graph. Regenerated wholesale on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub sessions: Vec<SessionRecord>,
    pub threads: BTreeMap<String, ThreadNode>,
    pub metadata: IndexMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRun {
    pub generated_at: String,
    pub generated_by: String,
    pub threads_source: ThreadsSource,
    pub sessions_count: usize,
    pub threads_count: usize,
    pub files_written: Vec<String>,
}

/// Provenance of one inferred relation, kept for human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredRelation {
    pub name: String,
    pub count: usize,
    pub prop: f64,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferredRelations {
    pub directly_related: Vec<InferredRelation>,
    pub often_related: Vec<InferredRelation>,
    pub occasionally_related: Vec<InferredRelation>,
}

impl InferredRelations {
    pub fn tier_mut(&mut self, relation: RelationType) -> &mut Vec<InferredRelation> {
        match relation {
            RelationType::DirectlyRelated => &mut self.directly_related,
            RelationType::OftenRelated => &mut self.often_related,
            RelationType::OccasionallyRelated => &mut self.occasionally_related,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredThread {
    pub count: usize,
    pub relations: InferredRelations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProvenance {
    pub source_sessions_count: usize,
}

/// Contents of `thread-map.inferred.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredMapExport {
    pub generated_at: String,
    pub generated_by: String,
    pub provenance: ExportProvenance,
    pub threads: BTreeMap<String, InferredThread>,
}

/// One line of a per-day agent log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSummary {
    pub by_agent: BTreeMap<String, usize>,
    pub by_action: BTreeMap<String, usize>,
    pub total_entries: usize,
    pub first_ts: Option<String>,
    pub last_ts: Option<String>,
    #[serde(default)]
    pub malformed_lines: usize,
}

/// Machine-readable block embedded in a session context file between
/// `<!--machine-json-start-->` and `<!--machine-json-end-->`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MachineBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_thread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_threads: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_threads: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_date: Option<String>,
    /// Other thread name -> relation tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_relationships: Option<BTreeMap<String, RelationType>>,
}

/// JSON Schema for [`MachineBlock`], pretty-printed.
pub fn machine_block_schema() -> Result<String> {
    let schema = schemars::schema_for!(MachineBlock);
    serde_json::to_string_pretty(&schema).map_err(Into::into)
}

/// Current UTC time as ISO-8601 with a `Z` suffix.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Write `value` as pretty JSON through a sibling temp file and a rename, so readers
/// never observe a partially written document.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    let tmp = tmp_path_for(path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

/// Read a JSON document, mapping a missing file to `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> std::io::Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
