//! Output formatting and styling module.
//!
//! Backup and restore never print on their own. They talk to a [`Reporter`],
//! which decides how progress and errors are shown. [`ConsoleReporter`] is the
//! colored terminal implementation used by the binary; [`RecordingReporter`]
//! keeps everything in memory for tests and library callers.

use crate::task::TaskKind;
use colored::*;
use std::path::{Path, PathBuf};

const ARROW: &str = "-->";

/// Receives the outcome of a backup or restore run.
pub trait Reporter {
    /// Called once before any mapping is processed.
    fn task_header(&mut self, task: TaskKind);

    /// Called for every mapping that completed.
    fn task_success(&mut self, source: &str, destination: &str);

    /// Called for every mapping that failed.
    fn task_failure(&mut self, source: &str, destination: &str);

    /// Called for every source symlink that was left out.
    fn link_skipped(&mut self, _path: &Path) {}

    /// Called once after all mappings, with the overall outcome.
    fn task_footer(&mut self, task: TaskKind, successful: bool);

    /// Called last with the deduplicated error messages, possibly empty.
    fn task_errors(&mut self, errors: &[String]);
}

/// Colored terminal output.
///
/// - Headers in cyan
/// - Mapping lines as blue paths joined by a green (success) or red (failure) arrow
/// - Skipped symlinks in yellow with ⚠
/// - A green success banner or a red error lead-in
/// - Errors indented by a tab
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Creates a new console reporter.
    pub fn new() -> Self {
        Self
    }

    fn mapping_line(source: &str, destination: &str, successful: bool) {
        let arrow = if successful { ARROW.green() } else { ARROW.red() };
        println!("{} {} {}", source.blue(), arrow, destination.blue());
    }
}

impl Reporter for ConsoleReporter {
    fn task_header(&mut self, task: TaskKind) {
        println!("{}\n", format!("bonclay: {} task", task).cyan());
    }

    fn task_success(&mut self, source: &str, destination: &str) {
        Self::mapping_line(source, destination, true);
    }

    fn task_failure(&mut self, source: &str, destination: &str) {
        Self::mapping_line(source, destination, false);
    }

    fn link_skipped(&mut self, path: &Path) {
        println!(
            "{} {}",
            "⚠".yellow(),
            format!("Skipped symbolic link: {}", path.display()).yellow()
        );
    }

    fn task_footer(&mut self, task: TaskKind, successful: bool) {
        if successful {
            println!("{}\n", format!("\n===> {} Successful", task.title()).green());
        } else {
            println!("{}", format!("\nSome errors occurred during {}:", task).red());
        }
    }

    fn task_errors(&mut self, errors: &[String]) {
        if errors.is_empty() {
            return;
        }

        for error in errors {
            println!("\t{}", error);
        }
        println!();
    }
}

/// A single recorded reporter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Header(TaskKind),
    Success { source: String, destination: String },
    Failure { source: String, destination: String },
    LinkSkipped(PathBuf),
    Footer { task: TaskKind, successful: bool },
    Errors(Vec<String>),
}

/// Keeps every reporter call, in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl RecordingReporter {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources of the mappings reported as failed.
    pub fn failures(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Failure { source, .. } => Some(source.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Sources of the mappings reported as successful.
    pub fn successes(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Success { source, .. } => Some(source.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn task_header(&mut self, task: TaskKind) {
        self.events.push(ReportEvent::Header(task));
    }

    fn task_success(&mut self, source: &str, destination: &str) {
        self.events.push(ReportEvent::Success {
            source: source.to_string(),
            destination: destination.to_string(),
        });
    }

    fn task_failure(&mut self, source: &str, destination: &str) {
        self.events.push(ReportEvent::Failure {
            source: source.to_string(),
            destination: destination.to_string(),
        });
    }

    fn link_skipped(&mut self, path: &Path) {
        self.events.push(ReportEvent::LinkSkipped(path.to_path_buf()));
    }

    fn task_footer(&mut self, task: TaskKind, successful: bool) {
        self.events.push(ReportEvent::Footer { task, successful });
    }

    fn task_errors(&mut self, errors: &[String]) {
        self.events.push(ReportEvent::Errors(errors.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_keeps_order() {
        let mut reporter = RecordingReporter::new();
        reporter.task_header(TaskKind::Backup);
        reporter.task_success("a", "b");
        reporter.task_failure("c", "d");
        reporter.task_footer(TaskKind::Backup, false);
        reporter.task_errors(&["boom".to_string()]);

        assert_eq!(reporter.events.len(), 5);
        assert_eq!(reporter.events[0], ReportEvent::Header(TaskKind::Backup));
        assert_eq!(reporter.successes(), vec!["a"]);
        assert_eq!(reporter.failures(), vec!["c"]);
        assert_eq!(
            reporter.events[4],
            ReportEvent::Errors(vec!["boom".to_string()])
        );
    }

    #[test]
    fn test_console_reporter_handles_empty_errors() {
        let mut reporter = ConsoleReporter::new();
        reporter.task_errors(&[]);
        reporter.task_footer(TaskKind::Restore, true);
    }
}
