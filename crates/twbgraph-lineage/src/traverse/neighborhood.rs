//! Neighborhood expansion over a normalized lineage graph.
//!
//! [`LineageGraph`] mirrors a [`Graph`] into a petgraph `DiGraph` so that
//! both edge directions can be walked cheaply. [`NeighborhoodEngine`] layers
//! bounded, memoized expansion on top:
//!
//! - depth is clamped to `[1, max_depth]` (never above 10);
//! - expansion stops early at a fixed point;
//! - at most `max_expansions` closed-neighborhood evaluations run per call.
//!
//! The memo is keyed by `(node id, clamped depth)` and belongs to one engine;
//! a new workbook load builds a new engine.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{instrument, warn};
use twbgraph_core::config::TraversalConfig;

use crate::graph::model::{Graph, Relation};

/// Directed lineage graph keyed by canonical node id.
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    pub graph: DiGraph<String, Relation>,
    pub node_map: HashMap<String, NodeIndex>,
}

impl LineageGraph {
    /// Mirror `graph`. Edges with unknown endpoints are skipped, so a
    /// normalized graph is expected.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        let mut out = DiGraph::<String, Relation>::with_capacity(graph.nodes.len(), graph.edges.len());
        let mut node_map = HashMap::with_capacity(graph.nodes.len());

        for node in &graph.nodes {
            if !node_map.contains_key(&node.id) {
                let idx = out.add_node(node.id.clone());
                node_map.insert(node.id.clone(), idx);
            }
        }
        for edge in &graph.edges {
            if let (Some(&s), Some(&t)) = (node_map.get(&edge.source), node_map.get(&edge.target)) {
                out.add_edge(s, t, edge.rel);
            }
        }

        Self {
            graph: out,
            node_map,
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.node_map.contains_key(id)
    }

    #[must_use]
    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    #[must_use]
    pub fn node_id(&self, idx: NodeIndex) -> Option<&str> {
        self.graph.node_weight(idx).map(String::as_str)
    }

    /// Neighbor ids in one direction, deduplicated and sorted.
    #[must_use]
    pub fn neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        let Some(idx) = self.node_index(id) else {
            return Vec::new();
        };
        let set: BTreeSet<&str> = self
            .graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.node_id(n))
            .collect();
        set.into_iter().collect()
    }

    /// `id` plus every node sharing an edge with it, in either direction.
    /// Empty when `id` is not in the graph.
    #[must_use]
    pub fn closed_neighborhood(&self, id: &str) -> BTreeSet<String> {
        let Some(idx) = self.node_index(id) else {
            return BTreeSet::new();
        };
        let mut out = BTreeSet::new();
        out.insert(id.to_string());
        for n in self.graph.neighbors_undirected(idx) {
            if let Some(neighbor) = self.node_id(n) {
                out.insert(neighbor.to_string());
            }
        }
        out
    }
}

/// Outcome of one expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub nodes: BTreeSet<String>,
    /// Depth after clamping.
    pub depth: usize,
    /// Hops that actually grew the set.
    pub hops: usize,
    /// The expansion budget ran out before the requested depth.
    pub truncated: bool,
}

/// Bounded, memoized neighborhood expansion.
#[derive(Debug)]
pub struct NeighborhoodEngine {
    lineage: LineageGraph,
    traversal: TraversalConfig,
    cache: HashMap<(String, usize), Expansion>,
    hits: u64,
    misses: u64,
}

impl NeighborhoodEngine {
    #[must_use]
    pub fn new(lineage: LineageGraph, traversal: TraversalConfig) -> Self {
        Self {
            lineage,
            traversal,
            cache: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    #[must_use]
    pub const fn lineage(&self) -> &LineageGraph {
        &self.lineage
    }

    #[must_use]
    pub fn closed_neighborhood(&self, id: &str) -> BTreeSet<String> {
        self.lineage.closed_neighborhood(id)
    }

    /// Every node within `depth` undirected hops of `id`, including `id`.
    ///
    /// `depth` is clamped before use and the clamped value is the cache key,
    /// so requests for 0 and 1 (or 10 and 50) share one entry. Unknown ids
    /// yield an empty set.
    #[instrument(skip(self))]
    pub fn expand_neighborhood(&mut self, id: &str, depth: usize) -> Expansion {
        let depth = self.traversal.clamp_depth(depth);
        let key = (id.to_string(), depth);
        if let Some(hit) = self.cache.get(&key) {
            self.hits += 1;
            return hit.clone();
        }
        self.misses += 1;

        let expansion = self.compute(id, depth);
        if expansion.truncated {
            warn!(
                id,
                depth,
                max_expansions = self.traversal.max_expansions,
                "neighborhood expansion hit its budget"
            );
        }
        self.cache.insert(key, expansion.clone());
        expansion
    }

    fn compute(&self, id: &str, depth: usize) -> Expansion {
        let mut nodes = BTreeSet::new();
        if !self.lineage.contains(id) {
            return Expansion {
                nodes,
                depth,
                hops: 0,
                truncated: false,
            };
        }

        nodes.insert(id.to_string());
        let mut frontier = vec![id.to_string()];
        let mut evaluations = 0usize;
        let mut hops = 0usize;
        let mut truncated = false;

        'hops: for _ in 0..depth {
            let mut grown = Vec::new();
            for node in &frontier {
                if evaluations >= self.traversal.max_expansions {
                    truncated = true;
                    break 'hops;
                }
                evaluations += 1;
                for neighbor in self.lineage.closed_neighborhood(node) {
                    if nodes.insert(neighbor.clone()) {
                        grown.push(neighbor);
                    }
                }
            }
            if grown.is_empty() {
                break;
            }
            hops += 1;
            frontier = grown;
        }

        Expansion {
            nodes,
            depth,
            hops,
            truncated,
        }
    }

    /// Drop every memoized expansion.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// `(hits, misses)` since construction.
    #[must_use]
    pub const fn cache_stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
