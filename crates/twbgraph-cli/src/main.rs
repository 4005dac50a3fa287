#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use output::OutputMode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use twbgraph_core::config::resolve_config;
use twbgraph_core::error::ErrorCode;
use twbgraph_core::timing;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "twbg: Tableau workbook lineage graphs",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to ./twbgraph.toml, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Emit a per-stage timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Show the parsed workbook model",
        after_help = "EXAMPLES:\n    twbg metadata sales.twbx\n    twbg metadata sales.twb --format json"
    )]
    Metadata(cmd::metadata::MetadataArgs),

    #[command(
        about = "Emit the lineage graph",
        after_help = "EXAMPLES:\n    twbg graph sales.twbx --format json\n    twbg graph sales.twbx -o graph.json"
    )]
    Graph(cmd::graph::GraphArgs),

    #[command(
        about = "List circular calculation dependencies",
        after_help = "EXAMPLES:\n    twbg cycles sales.twbx"
    )]
    Cycles(cmd::cycles::CyclesArgs),

    #[command(
        about = "Expand the neighborhood around a node",
        after_help = "EXAMPLES:\n    twbg neighbors sales.twbx \"Profit Ratio\"\n    twbg neighbors sales.twbx Calculation_1002 --depth 3"
    )]
    Neighbors(cmd::neighbors::NeighborsArgs),

    #[command(
        about = "Rank nodes by hop distance",
        after_help = "EXAMPLES:\n    # Layers from dashboards down to raw fields\n    twbg rank sales.twbx\n\n    # Downstream impact of one field\n    twbg rank sales.twbx --from Sales"
    )]
    Rank(cmd::rank::RankArgs),

    #[command(
        about = "Find nodes by name",
        after_help = "EXAMPLES:\n    twbg search sales.twbx profit --limit 5"
    )]
    Search(cmd::search::SearchArgs),

    #[command(
        about = "Summary counts and warnings",
        after_help = "EXAMPLES:\n    twbg stats sales.twbx --format json"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        about = "Repair a {nodes, edges} graph JSON file",
        after_help = "EXAMPLES:\n    twbg normalize graph.json --format json"
    )]
    Normalize(cmd::normalize::NormalizeArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TWBG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "twbgraph=debug,info"
        } else {
            "twbgraph=info,warn"
        })
    });

    let format = env::var("TWBG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    let mode = output::resolve_output_mode(cli.format, cli.json);
    let working_dir = env::current_dir()?;
    let config = match resolve_config(cli.config.as_deref(), &working_dir) {
        Ok(config) => config,
        Err(err) => {
            output::render_error(
                mode,
                &output::CliError::coded(format!("{err:#}"), ErrorCode::ConfigParseError),
            )?;
            return Err(err.context("Failed to resolve configuration"));
        }
    };
    debug!(?config, "configuration resolved");

    let ctx = cmd::Context {
        config,
        output: mode,
    };

    let command_result = match &cli.command {
        Commands::Metadata(args) => {
            timing::timed("cmd.metadata", || cmd::metadata::run_metadata(args, &ctx))
        }
        Commands::Graph(args) => timing::timed("cmd.graph", || cmd::graph::run_graph(args, &ctx)),
        Commands::Cycles(args) => {
            timing::timed("cmd.cycles", || cmd::cycles::run_cycles(args, &ctx))
        }
        Commands::Neighbors(args) => timing::timed("cmd.neighbors", || {
            cmd::neighbors::run_neighbors(args, &ctx)
        }),
        Commands::Rank(args) => timing::timed("cmd.rank", || cmd::rank::run_rank(args, &ctx)),
        Commands::Search(args) => {
            timing::timed("cmd.search", || cmd::search::run_search(args, &ctx))
        }
        Commands::Stats(args) => timing::timed("cmd.stats", || cmd::stats::run_stats(args, &ctx)),
        Commands::Normalize(args) => timing::timed("cmd.normalize", || {
            cmd::normalize::run_normalize(args, &ctx)
        }),
    };

    if timing_enabled {
        let report = timing::collect_report();
        eprintln!("timing report:");
        eprintln!("{}", timing::display_table(&report));
    }

    command_result
}
