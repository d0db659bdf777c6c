//! textmerge CLI
//!
//! Main entry point for the textmerge command-line tool.
//! Provides diff, patch, apply and three-way merge for prose documents.

mod commands;

use clap::{Arg, ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{ApplyCommand, DiffCommand, MergeCommand, PatchCommand};
use std::path::PathBuf;
use std::process::ExitCode;
use textmerge_core::{config::AppConfig, logging, AppResult};
use textmerge_engine::embeddings::{create_provider, set_default_provider, EmbeddingConfig};

/// textmerge - three-way merge for natural-language text
#[derive(Parser, Debug)]
#[command(name = "textmerge")]
#[command(about = "Three-way merge, diff and patch for natural-language documents", long_about = None)]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "TEXTMERGE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "TEXTMERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Use character-frequency embeddings instead of the configured provider
    #[arg(long, global = true)]
    no_ml: bool,

    /// Conflict strategy (prefer-a, prefer-b, prefer-c, concatenate, defer)
    #[arg(short, long, global = true)]
    strategy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the edits between two versions of a document
    Diff(DiffCommand),

    /// Create a patch from two versions of a document
    Patch(PatchCommand),

    /// Apply a patch to a document
    Apply(ApplyCommand),

    /// Merge an upgrade into a customized copy of a document
    Merge(MergeCommand),
}

/// The derived command plus `-v/--version`.
fn command() -> clap::Command {
    Cli::command().arg(
        Arg::new("version")
            .short('v')
            .long("version")
            .action(ArgAction::Version)
            .help("Print version"),
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match command()
        .try_get_matches()
        .and_then(|matches| Cli::from_arg_matches(&matches))
    {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    // Load base configuration from file and environment
    let config = AppConfig::load_with(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.no_ml,
        cli.strategy,
    );
    config.validate()?;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format)?;

    tracing::info!("textmerge starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Embedding provider: {} ({})",
        config.embedding.provider,
        config.embedding.model
    );

    let provider = create_provider(&EmbeddingConfig::from(&config.embedding)).await?;
    set_default_provider(provider);

    let command_name = match &cli.command {
        Commands::Diff(_) => "diff",
        Commands::Patch(_) => "patch",
        Commands::Apply(_) => "apply",
        Commands::Merge(_) => "merge",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Diff(cmd) => cmd.execute(&config).await,
        Commands::Patch(cmd) => cmd.execute(&config).await,
        Commands::Apply(cmd) => cmd.execute(&config).await,
        Commands::Merge(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
