//! Read-only view over the runtime cache for agents (`threadmap show ...`).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use threadmap_graph::{RelatedThread, ThreadGraph};
use threadmap_journal::read_recent;
use threadmap_protocol::{
    read_json, IndexDocument, LastRun, LogEntry, LogSummary, RepoLayout, SessionRecord,
    ThreadNode,
};

pub struct RuntimeApi {
    layout: RepoLayout,
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    read_json(path).with_context(|| format!("Failed to read {}", path.display()))
}

impl RuntimeApi {
    pub fn new(layout: RepoLayout) -> Self {
        Self { layout }
    }

    /// `None` until `threadmap refresh` has produced a runtime index.
    pub fn read_index(&self) -> Result<Option<IndexDocument>> {
        load(&self.layout.runtime_index_path())
    }

    fn index(&self) -> Result<IndexDocument> {
        self.read_index()?.with_context(|| {
            format!(
                "No runtime index at {}; run `threadmap refresh` first",
                self.layout.runtime_index_path().display()
            )
        })
    }

    pub fn read_last_run(&self) -> Result<Option<LastRun>> {
        load(&self.layout.last_run_path())
    }

    pub fn read_summary(&self) -> Result<Option<LogSummary>> {
        load(&self.layout.summary_path())
    }

    pub fn list_threads(&self) -> Result<Vec<String>> {
        Ok(self.index()?.threads.into_keys().collect())
    }

    pub fn get_thread(&self, name: &str) -> Result<Option<ThreadNode>> {
        Ok(self.index()?.threads.remove(name))
    }

    pub fn sessions(&self) -> Result<Vec<SessionRecord>> {
        Ok(self.index()?.sessions)
    }

    /// Threads within `depth` hops of `name`, nearest and strongest first.
    pub fn expand(&self, name: &str, depth: usize) -> Result<Vec<RelatedThread>> {
        let graph = ThreadGraph::from_nodes(&self.index()?.threads);
        Ok(graph.related_within(name, depth)?)
    }

    pub fn read_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        Ok(read_recent(&self.layout.logs_dir(), limit)?)
    }
}
