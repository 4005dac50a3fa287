//! Subcommand handlers. Each module owns its clap `Args` struct and a
//! `run_*` entry point taking the resolved [`Context`].

pub mod cycles;
pub mod graph;
pub mod metadata;
pub mod neighbors;
pub mod normalize;
pub mod rank;
pub mod search;
pub mod stats;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use twbgraph_core::config::TwbgraphConfig;
use twbgraph_core::error::ErrorCode;
use twbgraph_lineage::WorkbookSession;
use twbgraph_lineage::graph::model::Node;

use crate::output::{CliError, OutputMode, render_error};

/// Resolved global state shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: TwbgraphConfig,
    pub output: OutputMode,
}

/// The workbook every read command operates on.
#[derive(Args, Debug, Clone)]
pub struct WorkbookArg {
    /// Path to a .twb or .twbx file.
    #[arg(value_name = "WORKBOOK")]
    pub workbook: PathBuf,
}

/// Read and load a workbook, rendering load failures with their error code.
pub fn open_session(path: &Path, ctx: &Context) -> anyhow::Result<WorkbookSession> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    match WorkbookSession::load(&bytes, &file_name, &ctx.config) {
        Ok(session) => Ok(session),
        Err(err) => {
            render_error(ctx.output, &CliError::from(&err))?;
            Err(anyhow::Error::new(err).context(format!("Failed to load {}", path.display())))
        }
    }
}

/// Look a node up by canonical id or name, rendering a coded error when
/// nothing matches.
pub fn resolve_node<'a>(
    session: &'a WorkbookSession,
    query: &str,
    ctx: &Context,
) -> anyhow::Result<&'a Node> {
    if let Some(node) = session.resolve(query) {
        return Ok(node);
    }
    render_error(
        ctx.output,
        &CliError::coded(format!("node '{query}' not found"), ErrorCode::NodeNotFound),
    )?;
    anyhow::bail!("node '{query}' not found")
}
