use bonclay::cli::{TaskCommand, run_cli};
use bonclay::config::CONFIG_FILE_NAME;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// bonclay - back up and restore files from a declarative mapping
#[derive(Parser)]
#[command(name = "bonclay", version, about)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log more details (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every configured source to its destination
    Backup,
    /// Copy every configured destination back to its source
    Restore,
    /// Write a configuration template
    Init {
        /// Where to write the template
        #[arg(default_value = CONFIG_FILE_NAME)]
        path: PathBuf,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let command = match cli.command {
        Commands::Backup => TaskCommand::Backup,
        Commands::Restore => TaskCommand::Restore,
        Commands::Init { path } => TaskCommand::Init { path },
    };

    match run_cli(command, cli.config.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
