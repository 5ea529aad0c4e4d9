use serde::{Deserialize, Serialize};

/// Statistics about one index run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Context files found by the scanner
    pub files_scanned: usize,

    /// Files that produced a session
    pub sessions: usize,

    /// Files without a session id
    pub files_without_session: usize,

    /// Threads in the emitted graph
    pub threads: usize,

    /// Edges in the emitted graph
    pub edges: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Per-file read errors (file was skipped)
    pub errors: Vec<String>,
}

impl IndexStats {
    pub fn new() -> Self {
        Self::default()
    }
}
