//! `twbg rank` — hop-distance layers for hierarchical layouts.
//!
//! Without `--from`, ranks upstream from the dashboards (or worksheets when
//! the workbook has no dashboards). With `--from`, ranks downstream from the
//! selected node.

use std::collections::BTreeMap;
use std::io::{self, Write};

use clap::Args;
use serde::Serialize;

use crate::cmd::{Context, WorkbookArg, open_session, resolve_node};
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct RankArgs {
    #[command(flatten)]
    pub input: WorkbookArg,

    /// Rank downstream from this node (id or name) instead of from the roots.
    #[arg(long, value_name = "NODE")]
    pub from: Option<String>,
}

#[derive(Debug, Serialize)]
struct RankOutput {
    mode: &'static str,
    roots: Vec<String>,
    max_depth: usize,
    unreached: usize,
    layers: BTreeMap<usize, Vec<String>>,
}

pub fn run_rank(args: &RankArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open_session(&args.input.workbook, ctx)?;

    let (mode, ranking) = match &args.from {
        Some(query) => {
            let node = resolve_node(&session, query, ctx)?;
            let ranking = session
                .rank_from_selection(&node.id)
                .ok_or_else(|| anyhow::anyhow!("node '{}' is not in the graph", node.id))?;
            ("selection", ranking)
        }
        None => ("hierarchy", session.rank_hierarchy()),
    };

    let layers: BTreeMap<usize, Vec<String>> = ranking
        .layers()
        .into_iter()
        .map(|(rank, ids)| (rank, ids.into_iter().map(str::to_string).collect()))
        .collect();
    let payload = RankOutput {
        mode,
        roots: ranking.roots,
        max_depth: ranking.max_depth,
        unreached: ranking.unreached,
        layers,
    };
    render_mode(ctx.output, &payload, render_text, render_pretty)
}

fn render_text(payload: &RankOutput, w: &mut dyn Write) -> io::Result<()> {
    for (rank, ids) in &payload.layers {
        for id in ids {
            writeln!(w, "{rank}\t{id}")?;
        }
    }
    Ok(())
}

fn render_pretty(payload: &RankOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Ranking ({})", payload.mode))?;
    pretty_kv(w, "roots", payload.roots.join(", "))?;
    pretty_kv(w, "max depth", payload.max_depth.to_string())?;
    pretty_kv(w, "unreached", payload.unreached.to_string())?;
    for (rank, ids) in &payload.layers {
        writeln!(w, "\n[{rank}] {}", ids.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> RankOutput {
        RankOutput {
            mode: "hierarchy",
            roots: vec!["Main".into()],
            max_depth: 1,
            unreached: 1,
            layers: BTreeMap::from([
                (0, vec!["Main".to_string()]),
                (1, vec!["Overview".to_string()]),
                (2, vec!["Orphan".to_string()]),
            ]),
        }
    }

    #[test]
    fn text_rows_are_rank_then_id() {
        let mut out = Vec::new();
        render_text(&payload(), &mut out).expect("render");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "0\tMain\n1\tOverview\n2\tOrphan\n"
        );
    }

    #[test]
    fn json_layers_are_keyed_by_rank() {
        let value = serde_json::to_value(payload()).expect("json");
        assert_eq!(value["layers"]["1"][0], "Overview");
        assert_eq!(value["mode"], "hierarchy");
    }
}
