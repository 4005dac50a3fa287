//! `twbg graph` — emit the normalized lineage graph.

use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::Context as _;
use clap::Args;
use tracing::info;
use twbgraph_lineage::graph::model::{Graph, Relation};

use crate::cmd::{Context, WorkbookArg, open_session};
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(flatten)]
    pub input: WorkbookArg,

    /// Write the JSON graph to this file instead of stdout.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub out: Option<std::path::PathBuf>,
}

pub fn run_graph(args: &GraphArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open_session(&args.input.workbook, ctx)?;

    if let Some(path) = &args.out {
        let json = serde_json::to_string_pretty(session.graph())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "graph written");
        return Ok(());
    }

    render_mode(ctx.output, session.graph(), render_graph_text, render_graph_pretty)
}

fn render_graph_text(graph: &Graph, w: &mut dyn Write) -> io::Result<()> {
    for edge in &graph.edges {
        writeln!(w, "{}\t{}\t{}", edge.source, edge.rel, edge.target)?;
    }
    Ok(())
}

fn render_graph_pretty(graph: &Graph, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Lineage graph")?;
    pretty_kv(w, "nodes", graph.nodes.len().to_string())?;
    pretty_kv(w, "edges", graph.edges.len().to_string())?;

    let mut by_relation: BTreeMap<Relation, Vec<(&str, &str)>> = BTreeMap::new();
    for edge in &graph.edges {
        by_relation
            .entry(edge.rel)
            .or_default()
            .push((edge.source.as_str(), edge.target.as_str()));
    }
    for (rel, edges) in by_relation {
        writeln!(w, "\n{rel} ({})", edges.len())?;
        for (source, target) in edges {
            writeln!(w, "  {source} → {target}")?;
        }
    }
    Ok(())
}
