//! # Threadmap Journal
//!
//! Append-only JSON-lines log of agent actions, one file per UTC day under
//! `runtime/logs/`, plus readers and a summarizer over those files.
//!
//! ```no_run
//! use serde_json::json;
//! use threadmap_journal::AgentLogger;
//! use threadmap_protocol::RepoLayout;
//!
//! let layout = RepoLayout::new("/path/to/repo");
//! let logger = AgentLogger::new(&layout, "agent-A");
//! logger.log(Some("s-1"), "note", json!({"msg": "did X"}), json!(null));
//! ```

mod error;
mod reader;
mod summary;
mod writer;

pub use error::{JournalError, Result};
pub use reader::{log_files, parse_lines, read_log_file, read_recent, tail, LogScan};
pub use summary::{summarize, summarize_dir, tally};
pub use writer::{day_file_name, normalize_object, AgentLogger, LOG_FILE_SUFFIX, UNKNOWN};
