use crate::{IndexerError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use threadmap_graph::{RelationTiers, RelationshipMap};
use threadmap_protocol::{RelationType, RepoLayout, ThreadsSource};

/// A candidate map file that exists but could not be used.
#[derive(Debug)]
pub struct SkippedCandidate {
    pub path: PathBuf,
    pub error: IndexerError,
}

/// Outcome of looking for an explicit relationship map.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Empty when no candidate produced relationships.
    pub relationships: RelationshipMap,
    /// Which candidate won, if any. A committed map that exists but is empty or
    /// unreadable does not count: the index then records where its relationships
    /// actually came from, usually `inferred_from_sessions`.
    pub source: Option<ThreadsSource>,
    pub skipped: Vec<SkippedCandidate>,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.source.is_some()
    }
}

/// Try each candidate in [`RepoLayout::relationship_candidates`] order; the first
/// existing, parseable, non-empty map wins. Broken candidates are recorded and skipped.
pub fn resolve_relationships(layout: &RepoLayout) -> Resolution {
    let mut resolution = Resolution::default();
    let committed = layout.committed_map_path();

    for path in layout.relationship_candidates() {
        if !path.is_file() {
            continue;
        }
        match load_candidate(&path) {
            Ok(map) if map.is_empty() => {
                log::debug!("Relationship map {} is empty, trying next", path.display());
            }
            Ok(map) => {
                let source = if path == committed {
                    ThreadsSource::CommittedMap
                } else {
                    ThreadsSource::LegacyFile(layout.relative(&path))
                };
                log::info!(
                    "Loaded {} thread relationships from {}",
                    map.len(),
                    path.display()
                );
                resolution.relationships = map;
                resolution.source = Some(source);
                return resolution;
            }
            Err(error) => {
                log::warn!("Skipping relationship map: {error}");
                resolution.skipped.push(SkippedCandidate { path, error });
            }
        }
    }

    resolution
}

/// Parse one candidate file by extension (`.yaml`/`.yml` vs JSON).
pub fn load_candidate(path: &Path) -> Result<RelationshipMap> {
    let text = std::fs::read_to_string(path).map_err(|e| IndexerError::read(path, e))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    let value: Value = if is_yaml {
        serde_yaml_ng::from_str(&text).map_err(|source| IndexerError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_json::from_str(&text).map_err(|source| IndexerError::Json {
            path: path.to_path_buf(),
            source,
        })?
    };
    relationships_from_value(path, value)
}

/// Accepts `{"thread_relationships": {...}}`, an exported index with `threads`
/// (tiers rebuilt from edges in edge order), or a bare name -> tiers mapping.
fn relationships_from_value(path: &Path, value: Value) -> Result<RelationshipMap> {
    let invalid = |reason: String| IndexerError::InvalidMap {
        path: path.to_path_buf(),
        reason,
    };

    let mut object = match value {
        Value::Object(object) => object,
        Value::Null => return Ok(RelationshipMap::new()),
        other => return Err(invalid(format!("expected an object, got {}", kind(&other)))),
    };

    if let Some(tiers) = object.remove("thread_relationships") {
        if tiers.is_null() {
            return Ok(RelationshipMap::new());
        }
        return serde_json::from_value(tiers).map_err(|e| invalid(e.to_string()));
    }

    if let Some(threads) = object.remove("threads") {
        return relationships_from_threads(&threads).map_err(invalid);
    }

    serde_json::from_value(Value::Object(object)).map_err(|e| invalid(e.to_string()))
}

fn relationships_from_threads(threads: &Value) -> std::result::Result<RelationshipMap, String> {
    let threads = threads
        .as_object()
        .ok_or_else(|| format!("`threads` must be an object, got {}", kind(threads)))?;

    let mut map = RelationshipMap::new();
    for (name, node) in threads {
        let mut tiers = RelationTiers::default();
        let edges = node.get("edges").and_then(Value::as_array);
        for edge in edges.into_iter().flatten() {
            let relation = edge.get("type").and_then(Value::as_str);
            let to = edge
                .get("to")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| edge.get("name").and_then(Value::as_str));
            let (Some(relation), Some(to)) = (relation, to) else {
                continue;
            };
            if relation.is_empty() || to.is_empty() {
                continue;
            }
            let relation: RelationType = relation.parse()?;
            tiers.push(relation, to);
        }
        map.insert(name.clone(), tiers);
    }
    Ok(map)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
