//! bonclay - A configuration-driven backup and restore utility
//!
//! This library copies files and directory trees according to a TOML mapping of
//! sources to destinations, in either direction. Mappings are exact path pairs or
//! glob patterns with regex exclusion filters; symlinks are skipped and existing
//! destinations are only replaced when overwriting is enabled.

pub mod cli;
pub mod config;
pub mod file_copier;
pub mod glob_copier;
pub mod output;
pub mod task;

pub use config::{ConfigError, Configuration, GlobTarget, TaskOptions};
pub use file_copier::{FileCopier, PathFilter, TaskError, TaskResult, WalkReport, copy_spec};
pub use glob_copier::{copy_glob, restore_glob};
pub use output::{ConsoleReporter, RecordingReporter, Reporter};
pub use task::{TaskKind, TaskReport, backup, dedup_errors, restore};

pub use cli::{TaskCommand, run_cli};
