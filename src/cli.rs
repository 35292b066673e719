//! Command-line interface module for bonclay.
//!
//! This module handles all CLI-related functionality including:
//! - Configuration loading and validation
//! - Backup and restore orchestration
//! - Writing a starter configuration file

use crate::config::Configuration;
use crate::output::{ConsoleReporter, Reporter};
use crate::task::{self, TaskKind, TaskReport};
use std::path::{Path, PathBuf};

/// Represents a CLI command to execute.
#[derive(Debug, Clone)]
pub enum TaskCommand {
    /// Copy sources to destinations.
    Backup,
    /// Copy destinations back to sources.
    Restore,
    /// Write a configuration template.
    Init {
        /// Where the template is written.
        path: PathBuf,
    },
}

/// Runs the CLI application with the given command.
///
/// Output goes to the terminal through a [`ConsoleReporter`].
///
/// # Arguments
///
/// * `command` - The command to execute
/// * `config_path` - Optional path to configuration file
///
/// # Examples
///
/// ```no_run
/// use bonclay::cli::{run_cli, TaskCommand};
/// use std::path::Path;
///
/// match run_cli(TaskCommand::Backup, Some(Path::new("bonclay.toml"))) {
///     Ok(()) => println!("Backup completed successfully"),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(command: TaskCommand, config_path: Option<&Path>) -> Result<(), String> {
    run_cli_with_reporter(command, config_path, &mut ConsoleReporter::new()).map(|_| ())
}

/// Runs the CLI application, sending progress to `reporter`.
///
/// Returns the run's report for backup and restore, `None` for init.
///
/// # Errors
///
/// Returns a message if the configuration cannot be loaded, the template cannot
/// be written, or any mapping failed.
pub fn run_cli_with_reporter(
    command: TaskCommand,
    config_path: Option<&Path>,
    reporter: &mut dyn Reporter,
) -> Result<Option<TaskReport>, String> {
    let kind = match command {
        TaskCommand::Init { path } => {
            init_config(&path)?;
            return Ok(None);
        }
        TaskCommand::Backup => TaskKind::Backup,
        TaskCommand::Restore => TaskKind::Restore,
    };

    let config = Configuration::load(config_path)
        .map_err(|e| format!("Error loading configuration: {}", e))?;

    if config.is_empty() {
        println!("Nothing to {}: configuration has no [spec] or [glob] entries.", kind);
    }

    let report = match kind {
        TaskKind::Backup => task::backup(&config, reporter),
        TaskKind::Restore => task::restore(&config, reporter),
    };

    if report.is_success() {
        Ok(Some(report))
    } else {
        Err(format!(
            "{} finished with {} failed mapping(s)",
            kind.title(),
            report.failed
        ))
    }
}

/// Writes a configuration template to `path`.
fn init_config(path: &Path) -> Result<(), String> {
    Configuration::write_template(path)
        .map_err(|e| format!("Error writing configuration: {}", e))?;

    println!("✓ Configuration written to {}", path.display());
    println!("Edit it, then run 'bonclay backup' to copy your files.");

    Ok(())
}
