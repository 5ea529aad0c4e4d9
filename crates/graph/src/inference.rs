//! Co-occurrence inference of thread relationships.
//!
//! Threads that show up together in the same session are related. The strength of
//! `a -> b` is the share of `a`'s sessions that also mention `b`, so the relation is
//! directional: a thread mentioned once alongside a busy thread relates strongly to
//! it, while the busy thread barely notices.

use crate::error::{GraphError, Result};
use crate::types::{RelationTiers, RelationshipMap};
use std::collections::BTreeMap;
use std::path::Path;
use threadmap_protocol::{
    ExportProvenance, InferredMapExport, InferredRelation, InferredRelations, InferredThread,
    RelationType, SessionRecord, GENERATED_BY,
};

/// Tier thresholds for inferred relations.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// Minimum proportion for `directly_related` (inclusive).
    pub direct_threshold: f64,
    /// Minimum proportion for `often_related` (inclusive).
    pub often_threshold: f64,
    /// Example session paths kept per directed pair.
    pub max_examples: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            direct_threshold: 0.6,
            often_threshold: 0.3,
            max_examples: 3,
        }
    }
}

impl InferenceConfig {
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| v > 0.0 && v <= 1.0;
        if !in_range(self.direct_threshold) || !in_range(self.often_threshold) {
            return Err(GraphError::InvalidConfig(format!(
                "thresholds must be in (0, 1], got direct={} often={}",
                self.direct_threshold, self.often_threshold
            )));
        }
        if self.often_threshold > self.direct_threshold {
            return Err(GraphError::InvalidConfig(format!(
                "often_threshold ({}) exceeds direct_threshold ({})",
                self.often_threshold, self.direct_threshold
            )));
        }
        Ok(())
    }

    /// Tier for a proportion; `None` when the threads never co-occur.
    pub fn classify(&self, prop: f64) -> Option<RelationType> {
        if prop >= self.direct_threshold {
            Some(RelationType::DirectlyRelated)
        } else if prop >= self.often_threshold {
            Some(RelationType::OftenRelated)
        } else if prop > 0.0 {
            Some(RelationType::OccasionallyRelated)
        } else {
            None
        }
    }
}

/// Threads a session belongs to: primary first, then related, without empties or repeats.
/// A session naming no thread at all falls back to one derived from its file name.
pub fn thread_set(session: &SessionRecord) -> Vec<String> {
    let mut threads: Vec<String> = Vec::new();
    let named = session
        .primary_thread
        .iter()
        .chain(session.related_threads.iter());
    for thread in named {
        if !thread.is_empty() && !threads.contains(thread) {
            threads.push(thread.clone());
        }
    }
    if threads.is_empty() {
        if let Some(name) = synthetic_thread(&session.path) {
            threads.push(name);
        }
    }
    threads
}

/// File stem with every run of non-alphanumeric characters collapsed to `-`.
pub fn synthetic_thread(path: &str) -> Option<String> {
    let stem = Path::new(path).file_stem()?.to_string_lossy();
    let mut name = String::with_capacity(stem.len());
    let mut pending_dash = false;
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !name.is_empty() {
                name.push('-');
            }
            pending_dash = false;
            name.push(ch);
        } else {
            pending_dash = true;
        }
    }
    (!name.is_empty()).then_some(name)
}

#[derive(Default)]
struct PairStats {
    count: usize,
    examples: Vec<String>,
}

/// Result of one inference pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub relationships: RelationshipMap,
    pub details: BTreeMap<String, InferredThread>,
    /// Sessions that contributed at least one thread, exported as
    /// `source_sessions_count`. This counts sessions, not thread occurrences: a
    /// session naming three threads adds one.
    pub sessions_considered: usize,
}

impl Inference {
    pub fn to_export(&self, generated_at: impl Into<String>) -> InferredMapExport {
        InferredMapExport {
            generated_at: generated_at.into(),
            generated_by: GENERATED_BY.to_string(),
            provenance: ExportProvenance {
                source_sessions_count: self.sessions_considered,
            },
            threads: self.details.clone(),
        }
    }
}

pub struct CooccurrenceInference {
    config: InferenceConfig,
}

impl CooccurrenceInference {
    pub fn new(config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn infer(&self, sessions: &[SessionRecord]) -> Inference {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut pairs: BTreeMap<String, BTreeMap<String, PairStats>> = BTreeMap::new();
        let mut sessions_considered = 0;

        for session in sessions {
            let threads = thread_set(session);
            if threads.is_empty() {
                continue;
            }
            sessions_considered += 1;
            for thread in &threads {
                *counts.entry(thread.clone()).or_default() += 1;
            }
            for (i, a) in threads.iter().enumerate() {
                for b in &threads[i + 1..] {
                    self.record_pair(&mut pairs, a, b, &session.path);
                    self.record_pair(&mut pairs, b, a, &session.path);
                }
            }
        }

        let mut relationships = RelationshipMap::new();
        let mut details = BTreeMap::new();
        for (thread, &count) in &counts {
            let mut related: Vec<(&String, &PairStats)> = pairs
                .get(thread)
                .map(|others| others.iter().collect())
                .unwrap_or_default();
            related.sort_by(|(a_name, a), (b_name, b)| {
                b.count.cmp(&a.count).then_with(|| a_name.cmp(b_name))
            });

            let mut tiers = RelationTiers::default();
            let mut relations = InferredRelations::default();
            for (other, stats) in related {
                let prop = stats.count as f64 / count as f64;
                let Some(relation) = self.config.classify(prop) else {
                    continue;
                };
                tiers.push(relation, other.clone());
                relations.tier_mut(relation).push(InferredRelation {
                    name: other.clone(),
                    count: stats.count,
                    prop,
                    examples: stats.examples.clone(),
                });
            }
            relationships.insert(thread.clone(), tiers);
            details.insert(thread.clone(), InferredThread { count, relations });
        }

        log::debug!(
            "Inferred relationships for {} threads from {} sessions",
            relationships.len(),
            sessions_considered
        );

        Inference {
            relationships,
            details,
            sessions_considered,
        }
    }

    fn record_pair(
        &self,
        pairs: &mut BTreeMap<String, BTreeMap<String, PairStats>>,
        from: &str,
        to: &str,
        path: &str,
    ) {
        let stats = pairs
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_default();
        stats.count += 1;
        if !path.is_empty() && stats.examples.len() < self.config.max_examples {
            stats.examples.push(path.to_string());
        }
    }
}

impl Default for CooccurrenceInference {
    fn default() -> Self {
        Self {
            config: InferenceConfig::default(),
        }
    }
}
