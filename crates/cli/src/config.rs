use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use threadmap_graph::InferenceConfig;
use threadmap_protocol::RepoLayout;

const DEFAULT_AGENT: &str = "threadmap";
const DEFAULT_TAIL: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct JournalConfig {
    /// Agent name for `log write` when `--agent` is omitted.
    pub default_agent: String,
    /// Entries shown by `log tail` without `-n`.
    pub tail: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            default_agent: DEFAULT_AGENT.to_string(),
            tail: DEFAULT_TAIL,
        }
    }
}

/// Settings from `.github/copilot/threadmap.toml`, defaults when the file is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadmapConfig {
    pub inference: InferenceConfig,
    pub journal: JournalConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    inference: Option<RawInference>,
    #[serde(default)]
    journal: Option<RawJournal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInference {
    direct_threshold: Option<f64>,
    often_threshold: Option<f64>,
    max_examples: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawJournal {
    default_agent: Option<String>,
    tail: Option<usize>,
}

impl ThreadmapConfig {
    pub fn load(layout: &RepoLayout) -> Result<Self> {
        Self::from_file(&layout.config_path())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawConfig) -> Self {
        let inference_defaults = InferenceConfig::default();
        let inference = raw.inference.unwrap_or_default();
        let journal_defaults = JournalConfig::default();
        let journal = raw.journal.unwrap_or_default();

        Self {
            inference: InferenceConfig {
                direct_threshold: inference
                    .direct_threshold
                    .unwrap_or(inference_defaults.direct_threshold),
                often_threshold: inference
                    .often_threshold
                    .unwrap_or(inference_defaults.often_threshold),
                max_examples: inference
                    .max_examples
                    .unwrap_or(inference_defaults.max_examples),
            },
            journal: JournalConfig {
                default_agent: journal
                    .default_agent
                    .filter(|agent| !agent.is_empty())
                    .unwrap_or(journal_defaults.default_agent),
                tail: journal.tail.unwrap_or(journal_defaults.tail),
            },
        }
    }
}
