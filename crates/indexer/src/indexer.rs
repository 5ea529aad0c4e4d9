use crate::error::{IndexerError, Result};
use crate::resolver::{resolve_relationships, SkippedCandidate};
use crate::scanner::ContextScanner;
use crate::session::ContextParser;
use crate::stats::IndexStats;
use std::path::{Path, PathBuf};
use std::time::Instant;
use threadmap_graph::{CooccurrenceInference, Inference, InferenceConfig, ThreadGraph};
use threadmap_protocol::paths::{
    INDEX_FILE_NAME, INFERRED_MAP_FILE_NAME, LAST_RUN_FILE_NAME, STALE_RELATIONSHIPS_FILE_NAME,
};
use threadmap_protocol::{
    utc_timestamp, write_json_atomic, IndexDocument, IndexMetadata, LastRun, RepoLayout,
    SessionRecord, ThreadsSource, GENERATED_BY,
};

#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Where `index.json` and friends go; `.github/copilot` when unset.
    pub out_dir: Option<PathBuf>,
    /// Also write `thread-map.inferred.json` when relationships were inferred.
    pub export_map: bool,
    pub inference: InferenceConfig,
}

/// Index document plus what produced it, before anything is written.
#[derive(Debug)]
pub struct BuiltIndex {
    pub document: IndexDocument,
    /// Present when no relationship map resolved and threads were inferred.
    pub inference: Option<Inference>,
    pub skipped_maps: Vec<SkippedCandidate>,
    pub stats: IndexStats,
}

#[derive(Debug)]
pub struct IndexOutcome {
    pub built: BuiltIndex,
    pub index_path: PathBuf,
    pub last_run: LastRun,
    /// Repository-relative paths, `last_run.json` last.
    pub files_written: Vec<String>,
}

/// Builds the combined sessions + thread graph index for one repository.
pub struct IndexBuilder {
    layout: RepoLayout,
    options: IndexOptions,
    parser: ContextParser,
    inference: CooccurrenceInference,
}

impl IndexBuilder {
    pub fn new(layout: RepoLayout, options: IndexOptions) -> Result<Self> {
        let root = layout.root();
        if !root.is_dir() {
            return Err(IndexerError::Other(format!(
                "Repository root does not exist: {}",
                root.display()
            )));
        }
        let inference = CooccurrenceInference::new(options.inference.clone())?;
        Ok(Self {
            parser: ContextParser::new()?,
            layout,
            options,
            inference,
        })
    }

    pub fn out_dir(&self) -> PathBuf {
        self.options
            .out_dir
            .clone()
            .unwrap_or_else(|| self.layout.copilot_dir())
    }

    /// Parse every context file, in path order. Unreadable files are skipped.
    pub fn collect_sessions(&self, stats: &mut IndexStats) -> Result<Vec<SessionRecord>> {
        let files = ContextScanner::new(self.layout.contexts_dir()).scan()?;
        stats.files_scanned = files.len();

        let mut sessions = Vec::with_capacity(files.len());
        for path in files {
            let rel_path = self.layout.relative(&path);
            match self.parser.parse_file(&path, &rel_path) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {
                    log::debug!("No session_id in {rel_path}, skipping");
                    stats.files_without_session += 1;
                }
                Err(e) => {
                    log::warn!("Skipping context file: {e}");
                    stats.errors.push(e.to_string());
                }
            }
        }
        stats.sessions = sessions.len();
        Ok(sessions)
    }

    /// Resolve or infer relationships and assemble the document without writing it.
    pub fn build(&self) -> Result<BuiltIndex> {
        let start = Instant::now();
        let mut stats = IndexStats::new();

        let sessions = self.collect_sessions(&mut stats)?;
        let resolution = resolve_relationships(&self.layout);

        let (graph, threads_source, inference) = match resolution.source {
            Some(source) => (
                ThreadGraph::from_relationships(&resolution.relationships),
                source,
                None,
            ),
            None => {
                let inference = self.inference.infer(&sessions);
                log::info!(
                    "No relationship map found; inferred {} threads from {} sessions",
                    inference.relationships.len(),
                    inference.sessions_considered
                );
                (
                    ThreadGraph::from_relationships(&inference.relationships),
                    ThreadsSource::InferredFromSessions,
                    Some(inference),
                )
            }
        };

        stats.threads = graph.thread_count();
        stats.edges = graph.edge_count();
        stats.time_ms = start.elapsed().as_millis() as u64;

        let document = IndexDocument {
            sessions,
            threads: graph.to_nodes(),
            metadata: IndexMetadata {
                threads_source,
                generated_at: utc_timestamp(),
                generated_by: GENERATED_BY.to_string(),
            },
        };

        Ok(BuiltIndex {
            document,
            inference,
            skipped_maps: resolution.skipped,
            stats,
        })
    }

    /// Build and write `index.json`, the optional inferred map and `last_run.json`.
    pub fn run(&self) -> Result<IndexOutcome> {
        let built = self.build()?;
        let out_dir = self.out_dir();
        std::fs::create_dir_all(&out_dir).map_err(|e| IndexerError::write(&out_dir, e))?;
        let generated_at = built.document.metadata.generated_at.clone();

        let index_path = out_dir.join(INDEX_FILE_NAME);
        write_file(&index_path, &built.document)?;
        let mut files_written = vec![self.layout.relative(&index_path)];

        if self.options.export_map {
            if let Some(inference) = &built.inference {
                let path = out_dir.join(INFERRED_MAP_FILE_NAME);
                write_file(&path, &inference.to_export(generated_at.clone()))?;
                files_written.push(self.layout.relative(&path));
            }
        }

        remove_stale(&out_dir.join(STALE_RELATIONSHIPS_FILE_NAME));

        let last_run = LastRun {
            generated_at,
            generated_by: GENERATED_BY.to_string(),
            threads_source: built.document.metadata.threads_source.clone(),
            sessions_count: built.document.sessions.len(),
            threads_count: built.document.threads.len(),
            files_written: files_written.clone(),
        };
        let last_run_path = out_dir.join(LAST_RUN_FILE_NAME);
        write_file(&last_run_path, &last_run)?;
        files_written.push(self.layout.relative(&last_run_path));

        log::info!(
            "Indexed {} sessions, {} threads in {}ms",
            built.stats.sessions,
            built.stats.threads,
            built.stats.time_ms
        );

        Ok(IndexOutcome {
            built,
            index_path,
            last_run,
            files_written,
        })
    }
}

fn write_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    write_json_atomic(path, value).map_err(|e| IndexerError::write(path, e))
}

fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::info!("Removed stale {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove stale {}: {e}", path.display()),
    }
}
