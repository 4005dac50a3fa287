//! Summary statistics for a lineage graph.
//!
//! - **nodes_by_kind** / **edges_by_relation**: counts per node kind and per
//!   relation, every kind and relation present (zero when absent).
//! - **lod_count** / **table_calc_count**: calculations carrying the
//!   heuristic LOD or table-calculation flag.
//! - **weakly_connected_component_count**: disjoint subgraphs when edge
//!   direction is ignored.
//! - **isolated_node_count**: nodes with no edges at all, typically raw
//!   columns nothing uses.
//! - **max_in_degree** / **max_out_degree**: the busiest consumer and the
//!   most widely used input.

use std::collections::BTreeMap;

use petgraph::Direction;
use petgraph::algo::connected_components;
use petgraph::graph::NodeIndex;
use petgraph::visit::IntoNodeIdentifiers;
use serde::Serialize;

use crate::graph::model::{Graph, NodeKind, Relation};
use crate::traverse::neighborhood::LineageGraph;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_kind: BTreeMap<NodeKind, usize>,
    pub edges_by_relation: BTreeMap<Relation, usize>,
    pub lod_count: usize,
    pub table_calc_count: usize,
    pub cycle_count: usize,
    pub weakly_connected_component_count: usize,
    pub isolated_node_count: usize,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
    pub content_hash: String,
}

impl GraphStats {
    #[must_use]
    pub fn compute(
        graph: &Graph,
        lineage: &LineageGraph,
        cycle_count: usize,
        content_hash: &str,
    ) -> Self {
        let mut nodes_by_kind: BTreeMap<NodeKind, usize> =
            NodeKind::ALL.iter().map(|k| (*k, 0)).collect();
        for node in &graph.nodes {
            *nodes_by_kind.entry(node.kind).or_default() += 1;
        }

        let mut edges_by_relation: BTreeMap<Relation, usize> =
            Relation::ALL.iter().map(|r| (*r, 0)).collect();
        for edge in &graph.edges {
            *edges_by_relation.entry(edge.rel).or_default() += 1;
        }

        let degree = |idx: NodeIndex, direction: Direction| {
            lineage.graph.neighbors_directed(idx, direction).count()
        };
        let isolated_node_count = lineage
            .graph
            .node_identifiers()
            .filter(|&idx| {
                degree(idx, Direction::Incoming) == 0 && degree(idx, Direction::Outgoing) == 0
            })
            .count();
        let max_in_degree = lineage
            .graph
            .node_identifiers()
            .map(|idx| degree(idx, Direction::Incoming))
            .max()
            .unwrap_or(0);
        let max_out_degree = lineage
            .graph
            .node_identifiers()
            .map(|idx| degree(idx, Direction::Outgoing))
            .max()
            .unwrap_or(0);

        Self {
            node_count: graph.nodes.len(),
            edge_count: graph.edges.len(),
            nodes_by_kind,
            edges_by_relation,
            lod_count: graph.nodes.iter().filter(|n| n.is_lod).count(),
            table_calc_count: graph.nodes.iter().filter(|n| n.is_table_calc).count(),
            cycle_count,
            weakly_connected_component_count: connected_components(&lineage.graph),
            isolated_node_count,
            max_in_degree,
            max_out_degree,
            content_hash: content_hash.to_string(),
        }
    }

    #[must_use]
    pub fn has_cycles(&self) -> bool {
        self.cycle_count > 0
    }

    #[must_use]
    pub fn count_of(&self, kind: NodeKind) -> usize {
        self.nodes_by_kind.get(&kind).copied().unwrap_or(0)
    }
}
