//! Structural repair for graph-shaped payloads.
//!
//! Accepts freshly built graphs as well as externally supplied ones and
//! guarantees, on return:
//!
//! - every node id is non-empty (after trimming) and unique;
//! - every edge's source and target exist in the node set;
//! - no two edges share a `(source, target, rel)` triple;
//! - every edge id is non-empty and unique (colliding ids get `-2`, `-3`, ...).
//!
//! Offending nodes and edges are dropped individually. Each drop reason
//! produces a single diagnostic carrying the count and a few sample ids.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::{debug, instrument};
use twbgraph_core::diagnostics::{Diagnostics, WarningKind};

use crate::graph::model::{Graph, Relation, derive_edge_id};

const SAMPLE_LIMIT: usize = 3;

/// Counts of what normalization changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub missing_node_ids: usize,
    pub duplicate_nodes: usize,
    pub dangling_edges: usize,
    pub duplicate_edges: usize,
    pub renamed_edges: usize,
}

impl NormalizeReport {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.missing_node_ids == 0
            && self.duplicate_nodes == 0
            && self.dangling_edges == 0
            && self.duplicate_edges == 0
            && self.renamed_edges == 0
    }
}

#[derive(Default)]
struct Drops {
    count: usize,
    samples: Vec<String>,
}

impl Drops {
    fn record(&mut self, sample: impl Into<String>) {
        self.count += 1;
        if self.samples.len() < SAMPLE_LIMIT {
            self.samples.push(sample.into());
        }
    }

    fn report(&self, diagnostics: &mut Diagnostics, kind: WarningKind, what: &str) {
        if self.count == 0 {
            return;
        }
        let mut message = format!("dropped {} {what}", self.count);
        if !self.samples.is_empty() {
            let _ = write!(message, " (e.g. {})", self.samples.join(", "));
        }
        diagnostics.warn(kind, message);
    }
}

/// Repair `graph`, returning the cleaned graph and what changed.
#[instrument(skip(graph, diagnostics), fields(nodes = graph.nodes.len(), edges = graph.edges.len()))]
pub fn normalize_graph(graph: Graph, diagnostics: &mut Diagnostics) -> (Graph, NormalizeReport) {
    let mut missing = Drops::default();
    let mut duplicates = Drops::default();
    let mut dangling = Drops::default();
    let mut repeated = Drops::default();
    let mut renamed = Drops::default();

    let mut seen_nodes: HashSet<String> = HashSet::with_capacity(graph.nodes.len());
    let mut nodes = Vec::with_capacity(graph.nodes.len());
    for (position, mut node) in graph.nodes.into_iter().enumerate() {
        let trimmed = node.id.trim();
        if trimmed.is_empty() {
            let label = if node.name.is_empty() {
                format!("#{position}")
            } else {
                node.name.clone()
            };
            missing.record(label);
            continue;
        }
        if trimmed.len() != node.id.len() {
            node.id = trimmed.to_string();
        }
        if !seen_nodes.insert(node.id.clone()) {
            duplicates.record(node.id.clone());
            continue;
        }
        nodes.push(node);
    }

    let mut seen_triples: HashSet<(String, String, Relation)> =
        HashSet::with_capacity(graph.edges.len());
    let mut seen_edges: HashSet<String> = HashSet::with_capacity(graph.edges.len());
    let mut edges = Vec::with_capacity(graph.edges.len());
    for mut edge in graph.edges {
        edge.source = edge.source.trim().to_string();
        edge.target = edge.target.trim().to_string();
        if !seen_nodes.contains(&edge.source) || !seen_nodes.contains(&edge.target) {
            dangling.record(format!("{} -> {}", edge.source, edge.target));
            continue;
        }
        if !seen_triples.insert((edge.source.clone(), edge.target.clone(), edge.rel)) {
            repeated.record(derive_edge_id(&edge.source, &edge.target, edge.rel));
            continue;
        }

        if edge.id.trim().is_empty() {
            edge.id = derive_edge_id(&edge.source, &edge.target, edge.rel);
        }
        if seen_edges.contains(&edge.id) {
            let base = edge.id.clone();
            let mut n = 2usize;
            while seen_edges.contains(&format!("{base}-{n}")) {
                n += 1;
            }
            edge.id = format!("{base}-{n}");
            renamed.record(base);
        }
        seen_edges.insert(edge.id.clone());
        edges.push(edge);
    }

    missing.report(diagnostics, WarningKind::MissingNodeId, "nodes without an id");
    duplicates.report(diagnostics, WarningKind::DuplicateNode, "nodes with a duplicate id");
    dangling.report(diagnostics, WarningKind::DanglingEdge, "edges with a missing endpoint");
    repeated.report(diagnostics, WarningKind::DuplicateEdge, "edges repeating an earlier edge");
    if renamed.count > 0 {
        diagnostics.warn(
            WarningKind::DuplicateEdgeId,
            format!(
                "renamed {} edges with a duplicate id (e.g. {})",
                renamed.count,
                renamed.samples.join(", ")
            ),
        );
    }

    let report = NormalizeReport {
        missing_node_ids: missing.count,
        duplicate_nodes: duplicates.count,
        dangling_edges: dangling.count,
        duplicate_edges: repeated.count,
        renamed_edges: renamed.count,
    };
    debug!(?report, nodes = nodes.len(), edges = edges.len(), "graph normalized");

    (Graph { nodes, edges }, report)
}
