//! `twbg search` — find nodes by name.

use std::io::{self, Write};

use clap::Args;
use serde::Serialize;
use twbgraph_lineage::graph::lookup::SearchEntry;

use crate::cmd::{Context, WorkbookArg, open_session};
use crate::output::render;

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[command(flatten)]
    pub input: WorkbookArg,

    /// Case-insensitive substring to look for.
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results.
    #[arg(long, short = 'n', default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    results: Vec<&'a SearchEntry>,
}

pub fn run_search(args: &SearchArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open_session(&args.input.workbook, ctx)?;
    let payload = SearchOutput {
        query: &args.query,
        results: session.search(&args.query, args.limit),
    };
    render(ctx.output, &payload, render_human)
}

fn render_human(payload: &SearchOutput<'_>, w: &mut dyn Write) -> io::Result<()> {
    if payload.results.is_empty() {
        writeln!(w, "No nodes match '{}'.", payload.query)?;
        return Ok(());
    }
    for entry in &payload.results {
        writeln!(w, "{}\t{}\t{}", entry.id, entry.kind, entry.name)?;
    }
    Ok(())
}
