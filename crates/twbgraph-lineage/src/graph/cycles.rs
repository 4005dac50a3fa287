//! Cycle detection over a finished lineage graph.
//!
//! Depth-first search from every unvisited node (in node order), keeping the
//! active path on an explicit stack. Reaching a node that is already on the
//! path materializes one cycle: the path slice from that node's position to
//! the top. Search continues until every node is visited, so disjoint cycles
//! are all reported.
//!
//! Detection is diagnostic only; the graph is never modified.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use tracing::instrument;

use crate::graph::model::Graph;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Find cycles in `graph`. Each cycle is an ordered id list `a, b, c`
/// meaning `a → b → c → a`. Self-loops are one-element cycles.
#[must_use]
#[instrument(skip(graph), fields(nodes = graph.nodes.len(), edges = graph.edges.len()))]
pub fn find_cycles(graph: &Graph) -> Vec<Vec<String>> {
    let index: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];
    for edge in &graph.edges {
        if let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
            adjacency[s].push(t);
        }
    }

    let mut marks = vec![Mark::Unvisited; graph.nodes.len()];
    let mut path_pos: Vec<Option<usize>> = vec![None; graph.nodes.len()];
    let mut cycles = Vec::new();

    for start in 0..graph.nodes.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        // (node, next adjacency slot to explore)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        let mut path: Vec<usize> = vec![start];
        marks[start] = Mark::OnPath;
        path_pos[start] = Some(0);

        while let Some(top) = stack.last_mut() {
            let (node, slot) = *top;
            let Some(&next) = adjacency[node].get(slot) else {
                stack.pop();
                path.pop();
                marks[node] = Mark::Done;
                path_pos[node] = None;
                continue;
            };
            top.1 += 1;

            match marks[next] {
                Mark::Unvisited => {
                    marks[next] = Mark::OnPath;
                    path_pos[next] = Some(path.len());
                    path.push(next);
                    stack.push((next, 0));
                }
                Mark::OnPath => {
                    if let Some(pos) = path_pos[next] {
                        cycles.push(
                            path[pos..]
                                .iter()
                                .map(|&i| graph.nodes[i].id.clone())
                                .collect(),
                        );
                    }
                }
                Mark::Done => {}
            }
        }
    }

    cycles
}

/// Render a cycle as `a → b → c → a`.
#[must_use]
pub fn format_cycle(cycle: &[String]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first);
    }
    parts.join(" → ")
}
