#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use docket_core::config::{EnvOverrides, resolve_config};
use docket_core::error::ErrorCode;
use output::{CliError, OutputMode};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "docket: daily reports over a shared document store",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format; overrides --json and the configured format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Store base URL; overrides config and `DOCKET_STORE_URL`.
    #[arg(long, global = true, value_name = "URL")]
    store: Option<String>,

    /// Read configuration from this file first.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List reconciled reports",
        long_about = "Fetch every report document, keep the newest per date, and list them.",
        after_help = "EXAMPLES:\n    # All dates\n    docket list\n\n    # Dates from June onward, with the ids each winner replaced\n    docket list --since 2024-06-01 --duplicates\n\n    # Emit machine-readable output\n    docket list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one report",
        long_about = "Show the canonical report for a date with its rows grouped by box.",
        after_help = "EXAMPLES:\n    # Show a day\n    docket show 2024-06-01\n\n    # Emit machine-readable output\n    docket show 2024-06-01 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Compute the row span layout",
        long_about = "Compute merged-cell spans for a report's rows, from the store or a local file.",
        after_help = "EXAMPLES:\n    # Layout of a stored report\n    docket layout 2024-06-01\n\n    # Layout of a local file, no store needed\n    docket layout --file rows.json --json"
    )]
    Layout(cmd::layout::LayoutArgs),

    #[command(
        next_help_heading = "Write",
        about = "Save a report",
        long_about = "Save rows for a date, replacing the current record and appending its change history.",
        after_help = "EXAMPLES:\n    # Save edited rows\n    docket save 2024-06-01 --file rows.json\n\n    # Emit machine-readable output\n    docket save 2024-06-01 --file rows.json --json"
    )]
    Save(cmd::save::SaveArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show a report's change history",
        long_about = "List the recorded action changes for a date, oldest first.",
        after_help = "EXAMPLES:\n    # History of a day\n    docket history 2024-06-01"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    docket completions bash\n\n    # Install zsh completions\n    docket completions zsh --out-dir ~/.zfunc"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

impl Cli {
    fn overrides(&self) -> EnvOverrides {
        let mut overrides = EnvOverrides::from_env();
        if let Some(url) = &self.store {
            overrides.store_url = Some(url.clone());
        }
        overrides
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("DOCKET_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "docket=debug,docket_core=debug,info"
        } else {
            "docket=info,docket_core=info,warn"
        })
    });

    let format = env::var("DOCKET_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output; logs go to stderr.
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
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let config = match resolve_config(&project_root, cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(err) => {
            let mode = output::resolve_output_mode(cli.format, cli.json, None);
            output::render_error(
                mode,
                &CliError::coded(format!("{err:#}"), ErrorCode::ConfigParseError),
            )?;
            return Err(err);
        }
    };
    let output = output::resolve_output_mode(cli.format, cli.json, config.output.as_deref());
    debug!(store = %config.store.base_url, ?output, "resolved configuration");

    let ctx = cmd::Context { config, output };
    match &cli.command {
        Commands::List(args) => cmd::list::run_list(args, &ctx),
        Commands::Show(args) => cmd::show::run_show(args, &ctx),
        Commands::Layout(args) => cmd::layout::run_layout(args, &ctx),
        Commands::Save(args) => cmd::save::run_save(args, &ctx),
        Commands::History(args) => cmd::history::run_history(args, &ctx),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args, &mut command)
        }
    }
}
