#![no_main]

use libfuzzer_sys::fuzz_target;
use twbgraph_core::diagnostics::Diagnostics;
use twbgraph_lineage::graph::model::Graph;
use twbgraph_lineage::graph::normalize_graph;

fuzz_target!(|data: &[u8]| {
    let Ok(graph) = serde_json::from_slice::<Graph>(data) else {
        return;
    };
    let (graph, _) = normalize_graph(graph, &mut Diagnostics::new());
    let ids = graph.node_ids();
    assert_eq!(ids.len(), graph.nodes.len());
    for edge in &graph.edges {
        assert!(ids.contains(edge.source.as_str()));
        assert!(ids.contains(edge.target.as_str()));
    }
});
