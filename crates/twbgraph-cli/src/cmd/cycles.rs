//! `twbg cycles` — list circular calculation dependencies.

use std::io::{self, Write};

use clap::Args;
use serde::Serialize;
use twbgraph_lineage::graph::cycles::format_cycle;

use crate::cmd::{Context, WorkbookArg, open_session};
use crate::output::render;

#[derive(Args, Debug)]
pub struct CyclesArgs {
    #[command(flatten)]
    pub input: WorkbookArg,
}

#[derive(Debug, Serialize)]
struct CyclesOutput {
    cycles: Vec<Vec<String>>,
}

pub fn run_cycles(args: &CyclesArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open_session(&args.input.workbook, ctx)?;
    let payload = CyclesOutput {
        cycles: session.cycles().to_vec(),
    };
    render(ctx.output, &payload, render_cycles_human)
}

fn render_cycles_human(payload: &CyclesOutput, w: &mut dyn Write) -> io::Result<()> {
    if payload.cycles.is_empty() {
        writeln!(w, "No circular dependencies found.")?;
        return Ok(());
    }

    writeln!(w, "Circular dependencies ({})", payload.cycles.len())?;
    for (idx, cycle) in payload.cycles.iter().enumerate() {
        writeln!(w, "  {}. {}", idx + 1, format_cycle(cycle))?;
    }
    Ok(())
}
