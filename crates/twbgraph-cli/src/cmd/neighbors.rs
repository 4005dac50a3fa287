//! `twbg neighbors` — expand the neighborhood around one node.

use std::io::{self, Write};

use clap::Args;
use serde::Serialize;
use twbgraph_lineage::WorkbookSession;
use twbgraph_lineage::graph::model::{NodeKind, Relation};

use crate::cmd::{Context, WorkbookArg, open_session, resolve_node};
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct NeighborsArgs {
    #[command(flatten)]
    pub input: WorkbookArg,

    /// Node id or name.
    #[arg(value_name = "NODE")]
    pub node: String,

    /// Hops to expand (clamped to 1..=10).
    #[arg(long, short = 'd', default_value_t = 1)]
    pub depth: usize,
}

#[derive(Debug, Serialize)]
struct NodeRef {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: NodeKind,
}

#[derive(Debug, Serialize)]
struct Link {
    id: String,
    rel: Relation,
}

#[derive(Debug, Serialize)]
struct NeighborsOutput {
    node: NodeRef,
    depth: usize,
    hops: usize,
    truncated: bool,
    /// Direct dependencies of the node.
    upstream: Vec<Link>,
    /// Direct dependents of the node.
    downstream: Vec<Link>,
    nodes: Vec<NodeRef>,
}

pub fn run_neighbors(args: &NeighborsArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut session = open_session(&args.input.workbook, ctx)?;
    let focus = resolve_node(&session, &args.node, ctx)?;
    let id = focus.id.clone();
    let node = NodeRef {
        id: focus.id.clone(),
        name: focus.name.clone(),
        kind: focus.kind,
    };
    let upstream = session
        .edges_into(&id)
        .into_iter()
        .map(|e| Link {
            id: e.source.clone(),
            rel: e.rel,
        })
        .collect();
    let downstream = session
        .edges_from(&id)
        .into_iter()
        .map(|e| Link {
            id: e.target.clone(),
            rel: e.rel,
        })
        .collect();

    let expansion = session.expand_neighborhood(&id, args.depth);
    let nodes = node_refs(&session, expansion.nodes.iter());

    let payload = NeighborsOutput {
        node,
        depth: expansion.depth,
        hops: expansion.hops,
        truncated: expansion.truncated,
        upstream,
        downstream,
        nodes,
    };
    render_mode(ctx.output, &payload, render_text, render_pretty)
}

fn node_refs<'a>(
    session: &WorkbookSession,
    ids: impl Iterator<Item = &'a String>,
) -> Vec<NodeRef> {
    ids.filter_map(|id| session.node(id))
        .map(|n| NodeRef {
            id: n.id.clone(),
            name: n.name.clone(),
            kind: n.kind,
        })
        .collect()
}

fn render_text(payload: &NeighborsOutput, w: &mut dyn Write) -> io::Result<()> {
    for node in &payload.nodes {
        writeln!(w, "{}\t{}\t{}", node.id, node.kind, node.name)?;
    }
    Ok(())
}

fn render_pretty(payload: &NeighborsOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{} ({})", payload.node.name, payload.node.kind))?;
    pretty_kv(w, "id", &payload.node.id)?;
    pretty_kv(w, "depth", format!("{} ({} hops)", payload.depth, payload.hops))?;
    if payload.truncated {
        pretty_kv(w, "truncated", "expansion budget reached")?;
    }
    for link in &payload.upstream {
        writeln!(w, "  ← {} [{}]", link.id, link.rel)?;
    }
    for link in &payload.downstream {
        writeln!(w, "  → {} [{}]", link.id, link.rel)?;
    }
    writeln!(w, "\n{} nodes in neighborhood", payload.nodes.len())?;
    for node in &payload.nodes {
        writeln!(w, "  {:<16} {}", node.kind.as_str(), node.name)?;
    }
    Ok(())
}
