//! `twbg normalize` — repair an externally supplied `{nodes, edges}` graph.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use twbgraph_core::diagnostics::Warning;
use twbgraph_lineage::WorkbookSession;
use twbgraph_lineage::graph::model::Graph;
use twbgraph_lineage::graph::normalize::NormalizeReport;

use crate::cmd::Context;
use crate::output::{CliError, pretty_kv, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Graph JSON file with `nodes` and `edges` arrays.
    #[arg(value_name = "GRAPH_JSON")]
    pub graph: PathBuf,
}

#[derive(Debug, Serialize)]
struct NormalizeOutput {
    graph: Graph,
    report: NormalizeReport,
    cycles: Vec<Vec<String>>,
    warnings: Vec<Warning>,
}

pub fn run_normalize(args: &NormalizeArgs, ctx: &Context) -> anyhow::Result<()> {
    let payload = std::fs::read_to_string(&args.graph)
        .with_context(|| format!("Failed to read {}", args.graph.display()))?;
    let graph = match Graph::from_json(&payload) {
        Ok(graph) => graph,
        Err(err) => {
            render_error(
                ctx.output,
                &CliError::new(format!("{} is not a graph payload: {err}", args.graph.display())),
            )?;
            return Err(err).context("Failed to parse graph JSON");
        }
    };

    let session = WorkbookSession::from_graph(graph, &ctx.config);
    let output = NormalizeOutput {
        graph: session.graph().clone(),
        report: session.normalize_report(),
        cycles: session.cycles().to_vec(),
        warnings: session.diagnostics().warnings().to_vec(),
    };
    render_mode(ctx.output, &output, render_text, render_pretty)
}

fn render_text(output: &NormalizeOutput, w: &mut dyn Write) -> io::Result<()> {
    let r = &output.report;
    writeln!(w, "nodes\t{}", output.graph.nodes.len())?;
    writeln!(w, "edges\t{}", output.graph.edges.len())?;
    writeln!(w, "missing_node_ids\t{}", r.missing_node_ids)?;
    writeln!(w, "duplicate_nodes\t{}", r.duplicate_nodes)?;
    writeln!(w, "dangling_edges\t{}", r.dangling_edges)?;
    writeln!(w, "duplicate_edges\t{}", r.duplicate_edges)?;
    writeln!(w, "renamed_edges\t{}", r.renamed_edges)?;
    writeln!(w, "cycles\t{}", output.cycles.len())?;
    Ok(())
}

fn render_pretty(output: &NormalizeOutput, w: &mut dyn Write) -> io::Result<()> {
    let r = &output.report;
    pretty_section(w, "Normalized graph")?;
    pretty_kv(w, "nodes", output.graph.nodes.len().to_string())?;
    pretty_kv(w, "edges", output.graph.edges.len().to_string())?;
    if r.is_clean() {
        writeln!(w, "\nNo repairs needed.")?;
    } else {
        pretty_kv(w, "no id", r.missing_node_ids.to_string())?;
        pretty_kv(w, "duplicates", r.duplicate_nodes.to_string())?;
        pretty_kv(w, "dangling", r.dangling_edges.to_string())?;
        pretty_kv(w, "repeated", r.duplicate_edges.to_string())?;
        pretty_kv(w, "renamed", r.renamed_edges.to_string())?;
    }
    for warning in &output.warnings {
        writeln!(w, "  {warning}")?;
    }
    Ok(())
}
