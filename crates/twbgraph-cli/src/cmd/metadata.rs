//! `twbg metadata` — show the parsed workbook model.

use std::io::{self, Write};

use clap::Args;
use twbgraph_core::model::WorkbookMetadata;

use crate::cmd::{Context, WorkbookArg, open_session};
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct MetadataArgs {
    #[command(flatten)]
    pub input: WorkbookArg,
}

pub fn run_metadata(args: &MetadataArgs, ctx: &Context) -> anyhow::Result<()> {
    let session = open_session(&args.input.workbook, ctx)?;
    render_mode(
        ctx.output,
        session.metadata(),
        render_metadata_text,
        render_metadata_pretty,
    )
}

fn render_metadata_text(md: &WorkbookMetadata, w: &mut dyn Write) -> io::Result<()> {
    for (ds, field) in md.all_fields() {
        let kind = if field.is_calculated { "calc" } else { "field" };
        writeln!(w, "{kind}\t{}\t{}\t{}", ds.caption, field.id, field.display_name)?;
    }
    for param in &md.parameters {
        writeln!(w, "param\t\t{}\t{}", param.id, param.caption)?;
    }
    for sheet in &md.worksheets {
        writeln!(w, "worksheet\t\t{}\t{}", sheet.id, sheet.fields_used.join(","))?;
    }
    for dash in &md.dashboards {
        writeln!(w, "dashboard\t\t{}\t{}", dash.id, dash.worksheets.join(","))?;
    }
    Ok(())
}

fn render_metadata_pretty(md: &WorkbookMetadata, w: &mut dyn Write) -> io::Result<()> {
    for ds in &md.datasources {
        pretty_section(w, &format!("Datasource: {}", ds.caption))?;
        pretty_kv(w, "id", &ds.id)?;
        for conn in &ds.connections {
            let target = conn
                .filename
                .as_deref()
                .or(conn.server.as_deref())
                .unwrap_or("-");
            pretty_kv(w, "connection", format!("{} ({target})", conn.class))?;
        }
        for field in &ds.fields {
            match &field.calculation {
                Some(calc) => writeln!(w, "  ƒ {}  = {}", field.display_name, calc.formula)?,
                None => writeln!(w, "  • {}", field.display_name)?,
            }
        }
        writeln!(w)?;
    }

    if !md.parameters.is_empty() {
        pretty_section(w, "Parameters")?;
        for param in &md.parameters {
            let value = param.current_value.as_deref().unwrap_or("-");
            writeln!(w, "  {} = {value}", param.caption)?;
        }
        writeln!(w)?;
    }

    pretty_section(w, "Worksheets")?;
    for sheet in &md.worksheets {
        writeln!(w, "  {} [{}]", sheet.caption, sheet.fields_used.join(", "))?;
    }
    writeln!(w)?;

    pretty_section(w, "Dashboards")?;
    for dash in &md.dashboards {
        writeln!(w, "  {} [{}]", dash.caption, dash.worksheets.join(", "))?;
    }
    Ok(())
}
