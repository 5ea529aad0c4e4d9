use crate::error::{GraphError, Result};
use crate::expansion::recommend_expansion;
use crate::types::{RelationTiers, RelationshipMap};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use threadmap_protocol::{RelationType, ThreadEdge, ThreadNode};

/// Directed thread graph: node weights are thread names, edge weights are tiers.
///
/// Only threads that carried relationship info when the graph was built are
/// "described" and show up in [`ThreadGraph::to_nodes`]; targets that were never
/// described themselves still exist as nodes so traversal can reach them.
pub struct ThreadGraph {
    graph: DiGraph<String, RelationType>,
    name_index: HashMap<String, NodeIndex>,
    described: BTreeSet<String>,
}

/// A thread reached from a starting thread during traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedThread {
    pub name: String,
    pub distance: usize,
    /// Tier of the first hop on the path that reached this thread.
    pub via: RelationType,
    /// Product of edge weights along that path.
    pub score: f64,
}

impl ThreadGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_index: HashMap::new(),
            described: BTreeSet::new(),
        }
    }

    /// Build from a resolved relationship map; edges are inserted strongest tier first.
    ///
    /// A thread listing itself keeps that edge, but never appears in its own
    /// recommended expansion. Empty names are dropped.
    pub fn from_relationships(relationships: &RelationshipMap) -> Self {
        let mut graph = Self::new();
        for (thread, tiers) in relationships {
            graph.describe(thread, tiers);
        }
        graph
    }

    /// Rebuild from the `threads` section of an index document.
    pub fn from_nodes(nodes: &BTreeMap<String, ThreadNode>) -> Self {
        let mut graph = Self::new();
        for (name, node) in nodes {
            let mut tiers = RelationTiers::default();
            for edge in &node.edges {
                tiers.push(edge.relation, edge.to.clone());
            }
            graph.describe(name, &tiers);
        }
        graph
    }

    fn describe(&mut self, thread: &str, tiers: &RelationTiers) {
        let from = self.ensure_node(thread);
        self.described.insert(thread.to_string());
        for (relation, to) in tiers.iter() {
            if to.is_empty() {
                log::debug!("Ignoring empty edge on thread {thread}");
                continue;
            }
            let to = self.ensure_node(to);
            self.graph.add_edge(from, to, relation);
        }
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.name_index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.name_index.insert(name.to_string(), idx);
        idx
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    /// Number of threads with relationship info.
    pub fn thread_count(&self) -> usize {
        self.described.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing edges of `name` in insertion order.
    pub fn edges(&self, name: &str) -> Vec<ThreadEdge> {
        let Some(idx) = self.name_index.get(name) else {
            return Vec::new();
        };
        // petgraph walks adjacency lists newest-first; restore insertion order.
        let mut edges: Vec<(EdgeIndex, NodeIndex, RelationType)> = self
            .graph
            .edges(*idx)
            .map(|e| (e.id(), e.target(), *e.weight()))
            .collect();
        edges.sort_by_key(|(id, _, _)| id.index());
        edges
            .into_iter()
            .map(|(_, target, relation)| ThreadEdge {
                to: self.graph[target].clone(),
                relation,
                weight: relation.weight(),
            })
            .collect()
    }

    pub fn recommended_expansion(&self, name: &str) -> Vec<String> {
        let mut tiers = RelationTiers::default();
        for edge in self.edges(name) {
            tiers.push(edge.relation, edge.to);
        }
        recommend_expansion(name, &tiers)
    }

    /// Graph nodes for every described thread, keyed by name.
    pub fn to_nodes(&self) -> BTreeMap<String, ThreadNode> {
        self.described
            .iter()
            .map(|name| {
                let node = ThreadNode {
                    name: name.clone(),
                    edges: self.edges(name),
                    recommended_expansion: self.recommended_expansion(name),
                };
                (name.clone(), node)
            })
            .collect()
    }

    /// Breadth-first walk from `name` up to `max_depth` hops.
    ///
    /// Neighbors are visited in recommendation order, so at each distance stronger
    /// relations come first. Each thread is reported once, at its shortest distance.
    pub fn related_within(&self, name: &str, max_depth: usize) -> Result<Vec<RelatedThread>> {
        let start = *self
            .name_index
            .get(name)
            .ok_or_else(|| GraphError::ThreadNotFound(name.to_string()))?;

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize, None::<RelationType>, 1.0f64)]);
        let mut related = Vec::new();

        while let Some((current, depth, via, score)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in self.edges(&self.graph[current]) {
                let Some(target) = self.name_index.get(&edge.to).copied() else {
                    continue;
                };
                if !visited.insert(target) {
                    continue;
                }
                let via = via.unwrap_or(edge.relation);
                let score = score * edge.weight;
                related.push(RelatedThread {
                    name: edge.to.clone(),
                    distance: depth + 1,
                    via,
                    score,
                });
                queue.push_back((target, depth + 1, Some(via), score));
            }
        }

        Ok(related)
    }
}

impl Default for ThreadGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tiers(direct: &[&str], often: &[&str], occasional: &[&str]) -> RelationTiers {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        RelationTiers {
            directly_related: owned(direct),
            often_related: owned(often),
            occasionally_related: owned(occasional),
        }
    }

    fn sample() -> ThreadGraph {
        let mut map = RelationshipMap::new();
        map.insert("auth".into(), tiers(&["db"], &["ui", "db"], &["ops"]));
        map.insert("db".into(), tiers(&["schema"], &[], &[]));
        ThreadGraph::from_relationships(&map)
    }

    #[test]
    fn edges_keep_tier_order_and_weights() {
        let graph = sample();
        let edges = graph.edges("auth");
        let summary: Vec<_> = edges
            .iter()
            .map(|e| (e.to.as_str(), e.relation, e.weight))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("db", RelationType::DirectlyRelated, 1.0),
                ("ui", RelationType::OftenRelated, 0.6),
                ("db", RelationType::OftenRelated, 0.6),
                ("ops", RelationType::OccasionallyRelated, 0.3),
            ]
        );
        assert_eq!(graph.recommended_expansion("auth"), vec!["db", "ui", "ops"]);
    }

    #[test]
    fn self_reference_is_an_edge_but_never_recommended() {
        let mut map = RelationshipMap::new();
        map.insert("auth".into(), tiers(&["auth", "db"], &["", "auth"], &[]));
        let graph = ThreadGraph::from_relationships(&map);

        let targets: Vec<_> = graph
            .edges("auth")
            .into_iter()
            .map(|e| (e.to, e.relation))
            .collect();
        assert_eq!(
            targets,
            vec![
                ("auth".to_string(), RelationType::DirectlyRelated),
                ("db".to_string(), RelationType::DirectlyRelated),
                ("auth".to_string(), RelationType::OftenRelated),
            ]
        );
        assert_eq!(graph.recommended_expansion("auth"), vec!["db"]);

        let related = graph.related_within("auth", 2).unwrap();
        let names: Vec<_> = related.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["db"]);
    }

    #[test]
    fn only_described_threads_become_nodes() {
        let graph = sample();
        let nodes = graph.to_nodes();
        assert_eq!(nodes.keys().collect::<Vec<_>>(), vec!["auth", "db"]);
        assert!(graph.contains("ops"));
        assert_eq!(graph.thread_count(), 2);
        assert_eq!(graph.edge_count(), 5);
    }

    #[test]
    fn rebuild_from_nodes_is_lossless() {
        let graph = sample();
        let nodes = graph.to_nodes();
        let rebuilt = ThreadGraph::from_nodes(&nodes);
        assert_eq!(rebuilt.to_nodes(), nodes);
    }

    #[test]
    fn related_within_reports_shortest_distance_once() {
        let graph = sample();
        let related = graph.related_within("auth", 2).unwrap();
        let names: Vec<_> = related
            .iter()
            .map(|r| (r.name.as_str(), r.distance))
            .collect();
        assert_eq!(
            names,
            vec![("db", 1), ("ui", 1), ("ops", 1), ("schema", 2)]
        );
        let schema = related.iter().find(|r| r.name == "schema").unwrap();
        assert_eq!(schema.via, RelationType::DirectlyRelated);
        assert!((schema.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn related_within_unknown_thread_errors() {
        let graph = sample();
        assert!(matches!(
            graph.related_within("nope", 1),
            Err(GraphError::ThreadNotFound(_))
        ));
    }
}
