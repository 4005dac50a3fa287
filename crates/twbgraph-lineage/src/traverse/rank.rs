//! Hop-distance ranking for hierarchical layouts.
//!
//! Edges point dependency → dependent, so ranking *from roots* (dashboards,
//! worksheets) walks edges backwards toward the fields that feed them, while
//! ranking *from a selection* walks forwards toward what the selection feeds.
//!
//! Every node in the graph receives a rank. Nodes the search never reaches
//! are placed one level below the deepest reached node; when nothing was
//! reached at all they all share rank 0.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, VecDeque};

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::debug;

use crate::traverse::neighborhood::LineageGraph;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ranking {
    /// Node id → rank.
    pub ranks: BTreeMap<String, usize>,
    /// Roots the search actually started from.
    pub roots: Vec<String>,
    /// Largest distance among reached nodes.
    pub max_depth: usize,
    pub unreached: usize,
}

impl Ranking {
    #[must_use]
    pub fn rank_of(&self, id: &str) -> Option<usize> {
        self.ranks.get(id).copied()
    }

    /// Node ids grouped by rank, ascending; ids sorted within a rank.
    #[must_use]
    pub fn layers(&self) -> BTreeMap<usize, Vec<&str>> {
        let mut layers: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for (id, rank) in &self.ranks {
            layers.entry(*rank).or_default().push(id);
        }
        layers
    }
}

/// BFS over incoming edges from `roots`. Unknown roots are ignored.
#[must_use]
pub fn rank_from_roots(lineage: &LineageGraph, roots: &[String]) -> Ranking {
    bfs(lineage, roots, Direction::Incoming)
}

/// Rank from the first tier that has at least one root in the graph
/// (e.g. dashboards, then worksheets).
#[must_use]
pub fn rank_from_root_tiers(lineage: &LineageGraph, tiers: &[Vec<String>]) -> Ranking {
    let tier = tiers
        .iter()
        .find(|tier| tier.iter().any(|id| lineage.contains(id)))
        .map_or(&[][..], Vec::as_slice);
    bfs(lineage, tier, Direction::Incoming)
}

/// Directed BFS distance from `id` along outgoing edges. `None` when `id` is
/// not in the graph.
#[must_use]
pub fn rank_from_selection(lineage: &LineageGraph, id: &str) -> Option<Ranking> {
    if !lineage.contains(id) {
        return None;
    }
    Some(bfs(lineage, &[id.to_string()], Direction::Outgoing))
}

fn bfs(lineage: &LineageGraph, roots: &[String], direction: Direction) -> Ranking {
    let mut distance: HashMap<NodeIndex, usize> = HashMap::new();
    let mut queue = VecDeque::new();
    let mut used_roots = Vec::new();

    for root in roots {
        let Some(idx) = lineage.node_index(root) else {
            continue;
        };
        if distance.insert(idx, 0).is_none() {
            queue.push_back(idx);
            used_roots.push(root.clone());
        }
    }

    while let Some(idx) = queue.pop_front() {
        let next = distance.get(&idx).copied().unwrap_or(0) + 1;
        for neighbor in lineage.graph.neighbors_directed(idx, direction) {
            if let Entry::Vacant(slot) = distance.entry(neighbor) {
                slot.insert(next);
                queue.push_back(neighbor);
            }
        }
    }

    let max_depth = distance.values().copied().max().unwrap_or(0);
    let fill = if distance.is_empty() { 0 } else { max_depth + 1 };

    let mut ranks = BTreeMap::new();
    let mut unreached = 0;
    for idx in lineage.graph.node_indices() {
        let Some(id) = lineage.node_id(idx) else {
            continue;
        };
        let rank = distance.get(&idx).copied().unwrap_or_else(|| {
            unreached += 1;
            fill
        });
        ranks.insert(id.to_string(), rank);
    }

    debug!(
        ?direction,
        roots = used_roots.len(),
        max_depth,
        unreached,
        "ranking computed"
    );

    Ranking {
        ranks,
        roots: used_roots,
        max_depth,
        unreached,
    }
}
