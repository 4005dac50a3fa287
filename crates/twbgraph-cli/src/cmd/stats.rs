//! `twbg stats` — summary counts and data-quality warnings.

use std::io::{self, Write};

use clap::Args;
use serde::Serialize;
use twbgraph_core::diagnostics::Warning;
use twbgraph_lineage::GraphStats;

use crate::cmd::{Context, WorkbookArg, open_session};
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub input: WorkbookArg,
}

#[derive(Debug, Serialize)]
struct StatsOutput {
    #[serde(flatten)]
    stats: GraphStats,
    warnings: Vec<Warning>,
}

pub fn run_stats(args: &StatsArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open_session(&args.input.workbook, ctx)?;
    let payload = StatsOutput {
        stats: session.stats(),
        warnings: session.diagnostics().warnings().to_vec(),
    };
    render_mode(ctx.output, &payload, render_text, render_pretty)
}

fn render_text(payload: &StatsOutput, w: &mut dyn Write) -> io::Result<()> {
    let s = &payload.stats;
    writeln!(w, "nodes\t{}", s.node_count)?;
    writeln!(w, "edges\t{}", s.edge_count)?;
    for (kind, count) in &s.nodes_by_kind {
        writeln!(w, "nodes.{kind}\t{count}")?;
    }
    for (rel, count) in &s.edges_by_relation {
        writeln!(w, "edges.{rel}\t{count}")?;
    }
    writeln!(w, "cycles\t{}", s.cycle_count)?;
    writeln!(w, "components\t{}", s.weakly_connected_component_count)?;
    writeln!(w, "isolated\t{}", s.isolated_node_count)?;
    writeln!(w, "warnings\t{}", payload.warnings.len())?;
    writeln!(w, "hash\t{}", s.content_hash)?;
    Ok(())
}

fn render_pretty(payload: &StatsOutput, w: &mut dyn Write) -> io::Result<()> {
    let s = &payload.stats;
    pretty_section(w, "Graph")?;
    pretty_kv(w, "nodes", s.node_count.to_string())?;
    pretty_kv(w, "edges", s.edge_count.to_string())?;
    pretty_kv(w, "components", s.weakly_connected_component_count.to_string())?;
    pretty_kv(w, "isolated", s.isolated_node_count.to_string())?;
    pretty_kv(w, "max in", s.max_in_degree.to_string())?;
    pretty_kv(w, "max out", s.max_out_degree.to_string())?;
    pretty_kv(w, "hash", &s.content_hash)?;

    writeln!(w)?;
    pretty_section(w, "Nodes")?;
    for (kind, count) in &s.nodes_by_kind {
        pretty_kv(w, kind.as_str(), count.to_string())?;
    }
    pretty_kv(w, "LOD", s.lod_count.to_string())?;
    pretty_kv(w, "table calc", s.table_calc_count.to_string())?;

    writeln!(w)?;
    pretty_section(w, "Edges")?;
    for (rel, count) in &s.edges_by_relation {
        pretty_kv(w, rel.as_str(), count.to_string())?;
    }

    if !payload.warnings.is_empty() {
        writeln!(w)?;
        pretty_section(w, &format!("Warnings ({})", payload.warnings.len()))?;
        for warning in &payload.warnings {
            writeln!(w, "  {warning}")?;
        }
    }
    Ok(())
}
