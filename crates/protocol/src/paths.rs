use std::path::{Path, PathBuf};

pub const GITHUB_DIR_NAME: &str = ".github";
pub const COPILOT_DIR_NAME: &str = "copilot";
pub const CONTEXTS_DIR_NAME: &str = "contexts";
pub const RUNTIME_DIR_NAME: &str = "runtime";
pub const LOGS_DIR_NAME: &str = "logs";
pub const BIN_DIR_NAME: &str = ".bin";
pub const CHATS_DIR_NAME: &str = ".copilot-chats";

pub const INDEX_FILE_NAME: &str = "index.json";
pub const LAST_RUN_FILE_NAME: &str = "last_run.json";
pub const INFERRED_MAP_FILE_NAME: &str = "thread-map.inferred.json";
pub const COMMITTED_MAP_FILE_NAME: &str = "thread-map.json";
pub const SCHEMA_FILE_NAME: &str = "schema.json";
pub const CONFIG_FILE_NAME: &str = "threadmap.toml";
pub const SUMMARY_FILE_NAME: &str = "summary.json";
pub const LAST_REFRESHED_FILE_NAME: &str = "last_refreshed.txt";
// Older generators wrote relationships next to the index; the single-file index replaced it.
pub const STALE_RELATIONSHIPS_FILE_NAME: &str = "thread-relationships.json";

/// Every path threadmap reads or writes, derived from one repository root.
///
/// The runtime directory defaults to `.github/copilot/runtime` but can be pointed
/// elsewhere (tests, alternate caches) without touching the other locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    root: PathBuf,
    runtime_dir: PathBuf,
}

impl RepoLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let runtime_dir = root
            .join(GITHUB_DIR_NAME)
            .join(COPILOT_DIR_NAME)
            .join(RUNTIME_DIR_NAME);
        Self { root, runtime_dir }
    }

    #[must_use]
    pub fn with_runtime_dir(mut self, runtime_dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = runtime_dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    pub fn copilot_dir(&self) -> PathBuf {
        self.root.join(GITHUB_DIR_NAME).join(COPILOT_DIR_NAME)
    }

    pub fn contexts_dir(&self) -> PathBuf {
        self.copilot_dir().join(CONTEXTS_DIR_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.runtime_dir.join(LOGS_DIR_NAME)
    }

    pub fn chats_dir(&self) -> PathBuf {
        self.root.join(CHATS_DIR_NAME)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.copilot_dir().join(BIN_DIR_NAME)
    }

    pub fn committed_map_path(&self) -> PathBuf {
        self.contexts_dir().join(COMMITTED_MAP_FILE_NAME)
    }

    pub fn schema_path(&self) -> PathBuf {
        self.contexts_dir().join(SCHEMA_FILE_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.copilot_dir().join(CONFIG_FILE_NAME)
    }

    pub fn runtime_index_path(&self) -> PathBuf {
        self.runtime_dir.join(INDEX_FILE_NAME)
    }

    pub fn last_run_path(&self) -> PathBuf {
        self.runtime_dir.join(LAST_RUN_FILE_NAME)
    }

    pub fn last_refreshed_path(&self) -> PathBuf {
        self.runtime_dir.join(LAST_REFRESHED_FILE_NAME)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.logs_dir().join(SUMMARY_FILE_NAME)
    }

    /// Candidate relationship files in resolution order.
    pub fn relationship_candidates(&self) -> Vec<PathBuf> {
        let contexts = self.contexts_dir();
        let legacy = self.root.join(GITHUB_DIR_NAME).join(CONTEXTS_DIR_NAME);
        vec![
            contexts.join(COMMITTED_MAP_FILE_NAME),
            contexts.join("thread-relationships.json"),
            contexts.join("thread-relationships.yaml"),
            legacy.join("thread-relationships.json"),
            legacy.join("thread-relationships.yaml"),
        ]
    }

    /// `path` relative to the repository root with `/` separators; paths outside the
    /// root are returned as given.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Nearest ancestor of `start` (inclusive) that holds `.github/copilot`.
    pub fn discover_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(GITHUB_DIR_NAME).join(COPILOT_DIR_NAME).is_dir())
            .map(Path::to_path_buf)
    }
}
