#![no_main]

use libfuzzer_sys::fuzz_target;
use twbgraph_core::config::TwbgraphConfig;
use twbgraph_lineage::WorkbookSession;

fuzz_target!(|data: &[u8]| {
    let config = TwbgraphConfig::default();
    for name in ["fuzz.twb", "fuzz.twbx"] {
        let Ok(mut session) = WorkbookSession::load(data, name, &config) else {
            continue;
        };
        let ids = session.graph().node_ids();
        assert_eq!(ids.len(), session.graph().nodes.len());
        for edge in &session.graph().edges {
            assert!(ids.contains(edge.source.as_str()));
            assert!(ids.contains(edge.target.as_str()));
        }
        if let Some(first) = session.graph().nodes.first().map(|n| n.id.clone()) {
            let _ = session.expand_neighborhood(&first, 10);
        }
        let _ = session.rank_hierarchy();
    }
});
