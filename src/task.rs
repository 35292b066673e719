/// Backup and restore runs over a whole configuration.
///
/// Each configured mapping is copied on its own: a failing mapping is reported
/// and its error collected, then the next mapping is attempted. Exact pairs run
/// before glob mappings, each group in key order.
use crate::config::Configuration;
use crate::file_copier::{TaskResult, WalkReport, copy_spec};
use crate::glob_copier::{copy_glob, restore_glob};
use crate::output::Reporter;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info};

/// Direction of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Copy sources to their configured destinations.
    Backup,
    /// Copy destinations back to their sources.
    Restore,
}

impl TaskKind {
    /// Capitalized name for banners.
    pub fn title(&self) -> &'static str {
        match self {
            TaskKind::Backup => "Backup",
            TaskKind::Restore => "Restore",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Backup => write!(f, "backup"),
            TaskKind::Restore => write!(f, "restore"),
        }
    }
}

/// Outcome of a backup or restore run.
#[derive(Debug, Default)]
pub struct TaskReport {
    /// Number of mappings that completed.
    pub succeeded: usize,
    /// Number of mappings that failed.
    pub failed: usize,
    /// Number of files copied across all mappings.
    pub copied_files: usize,
    /// Source symlinks that were left out.
    pub skipped_links: Vec<PathBuf>,
    /// Distinct error messages, in the order they first occurred.
    pub errors: Vec<String>,
}

impl TaskReport {
    /// Returns true if every mapping completed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Copies every configured source to its destination.
///
/// Uses the `[backup]` overwrite flag for both exact and glob mappings.
pub fn backup(config: &Configuration, reporter: &mut dyn Reporter) -> TaskReport {
    let overwrite = config.backup.overwrite;
    let mut run = Run::new(TaskKind::Backup, reporter);

    for (source, destination) in &config.spec {
        run.record(source, destination, copy_spec(source, destination, overwrite));
    }

    for (pattern, target) in &config.glob {
        let label = if target.filter.is_empty() {
            pattern.clone()
        } else {
            format!("{} <-{}->", pattern, target.filter)
        };
        run.record(&label, &target.dst, copy_glob(pattern, target, overwrite));
    }

    run.finish()
}

/// Copies every configured destination back to its source.
///
/// Uses the `[restore]` overwrite flag for both exact and glob mappings.
pub fn restore(config: &Configuration, reporter: &mut dyn Reporter) -> TaskReport {
    let overwrite = config.restore.overwrite;
    let mut run = Run::new(TaskKind::Restore, reporter);

    for (source, destination) in &config.spec {
        run.record(destination, source, copy_spec(destination, source, overwrite));
    }

    for (pattern, target) in &config.glob {
        run.record(&target.dst, pattern, restore_glob(target, pattern, overwrite));
    }

    run.finish()
}

/// Removes repeated messages, keeping the first occurrence of each.
///
/// # Examples
///
/// ```
/// use bonclay::task::dedup_errors;
///
/// let errors = vec!["X", "Y", "X", "Z"].into_iter().map(String::from).collect();
/// assert_eq!(dedup_errors(errors), vec!["X", "Y", "Z"]);
/// ```
pub fn dedup_errors(errors: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|error| seen.insert(error.clone()))
        .collect()
}

/// Bookkeeping for a run in progress.
struct Run<'a> {
    task: TaskKind,
    reporter: &'a mut dyn Reporter,
    report: TaskReport,
    errors: Vec<String>,
}

impl<'a> Run<'a> {
    fn new(task: TaskKind, reporter: &'a mut dyn Reporter) -> Self {
        info!("Starting {}", task);
        reporter.task_header(task);
        Self {
            task,
            reporter,
            report: TaskReport::default(),
            errors: Vec::new(),
        }
    }

    fn record(&mut self, source: &str, destination: &str, result: TaskResult<WalkReport>) {
        match result {
            Ok(walk) => {
                for link in &walk.skipped_links {
                    self.reporter.link_skipped(link);
                }
                self.reporter.task_success(source, destination);
                self.report.succeeded += 1;
                self.report.copied_files += walk.copied_files;
                self.report.skipped_links.extend(walk.skipped_links);
            }
            Err(e) => {
                error!("{} {} -> {}: {}", self.task, source, destination, e);
                self.reporter.task_failure(source, destination);
                self.report.failed += 1;
                self.errors.push(e.to_string());
            }
        }
    }

    fn finish(mut self) -> TaskReport {
        self.report.errors = dedup_errors(std::mem::take(&mut self.errors));
        let successful = self.report.is_success();

        self.reporter.task_footer(self.task, successful);
        self.reporter.task_errors(&self.report.errors);
        info!(
            "Finished {}: {} succeeded, {} failed",
            self.task, self.report.succeeded, self.report.failed
        );

        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobTarget;
    use crate::output::{RecordingReporter, ReportEvent};
    use std::fs;
    use tempfile::TempDir;

    fn path_str(path: &std::path::Path) -> String {
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_dedup_errors_keeps_first_occurrence() {
        let errors = vec!["X", "Y", "X", "Z"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(dedup_errors(errors), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_dedup_errors_empty() {
        assert!(dedup_errors(Vec::new()).is_empty());
    }

    #[test]
    fn test_task_kind_display() {
        assert_eq!(TaskKind::Backup.to_string(), "backup");
        assert_eq!(TaskKind::Restore.title(), "Restore");
    }

    #[test]
    fn test_backup_empty_config() {
        let mut reporter = RecordingReporter::new();
        let report = backup(&Configuration::default(), &mut reporter);

        assert!(report.is_success());
        assert_eq!(
            reporter.events,
            vec![
                ReportEvent::Header(TaskKind::Backup),
                ReportEvent::Footer {
                    task: TaskKind::Backup,
                    successful: true
                },
                ReportEvent::Errors(Vec::new()),
            ]
        );
    }

    #[test]
    fn test_backup_continues_after_failed_mapping() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let good = temp_dir.path().join("good.txt");
        fs::write(&good, "ok").expect("Failed to write file");

        let mut config = Configuration::default();
        config.spec.insert(
            path_str(&temp_dir.path().join("a_missing")),
            path_str(&temp_dir.path().join("out_missing")),
        );
        config
            .spec
            .insert(path_str(&good), path_str(&temp_dir.path().join("out_good")));

        let mut reporter = RecordingReporter::new();
        let report = backup(&config, &mut reporter);

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("does not exist"));
        assert!(temp_dir.path().join("out_good").exists());
        assert_eq!(reporter.successes(), vec![path_str(&good).as_str()]);
    }

    #[test]
    fn test_repeated_errors_are_reported_once() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let shared = temp_dir.path().join("shared.txt");
        let first = temp_dir.path().join("first.txt");
        let second = temp_dir.path().join("second.txt");
        fs::write(&shared, "taken").expect("Failed to write file");
        fs::write(&first, "1").expect("Failed to write file");
        fs::write(&second, "2").expect("Failed to write file");

        let mut config = Configuration::default();
        config.spec.insert(path_str(&first), path_str(&shared));
        config.spec.insert(path_str(&second), path_str(&shared));

        let mut reporter = RecordingReporter::new();
        let report = backup(&config, &mut reporter);

        assert_eq!(report.failed, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(reporter.failures().len(), 2);
    }

    #[test]
    fn test_restore_reverses_spec_and_glob() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let home_file = temp_dir.path().join("home").join("vimrc");
        let backup_file = temp_dir.path().join("backup").join("vimrc");
        let logs = temp_dir.path().join("logs");
        let archive = temp_dir.path().join("archive");
        fs::create_dir_all(backup_file.parent().unwrap()).expect("Failed to create dir");
        fs::write(&backup_file, "set number").expect("Failed to write file");
        fs::create_dir(&archive).expect("Failed to create archive");
        fs::write(archive.join("a.log"), "a").expect("Failed to write file");

        let mut config = Configuration::default();
        config
            .spec
            .insert(path_str(&home_file), path_str(&backup_file));
        config.glob.insert(
            path_str(&logs.join("*.log")),
            GlobTarget {
                dst: path_str(&archive),
                filter: String::new(),
            },
        );

        let mut reporter = RecordingReporter::new();
        let report = restore(&config, &mut reporter);

        assert!(report.is_success(), "errors: {:?}", report.errors);
        assert_eq!(
            fs::read_to_string(&home_file).expect("Missing restored file"),
            "set number"
        );
        assert!(logs.join("a.log").exists());
        assert_eq!(reporter.successes()[0], path_str(&backup_file));
    }

    #[test]
    fn test_restore_uses_restore_overwrite_flag() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let original = temp_dir.path().join("original.txt");
        let copy = temp_dir.path().join("copy.txt");
        fs::write(&original, "old").expect("Failed to write file");
        fs::write(&copy, "new").expect("Failed to write file");

        let mut config = Configuration::default();
        config.spec.insert(path_str(&original), path_str(&copy));
        config.backup.overwrite = false;
        config.restore.overwrite = true;

        let report = restore(&config, &mut RecordingReporter::new());

        assert!(report.is_success(), "errors: {:?}", report.errors);
        assert_eq!(
            fs::read_to_string(&original).expect("Failed to read file"),
            "new"
        );
    }

    #[test]
    fn test_glob_label_includes_filter() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let pattern = path_str(&temp_dir.path().join("*.none"));

        let mut config = Configuration::default();
        config.glob.insert(
            pattern.clone(),
            GlobTarget {
                dst: path_str(&temp_dir.path().join("out")),
                filter: "tmp".to_string(),
            },
        );

        let mut reporter = RecordingReporter::new();
        backup(&config, &mut reporter);

        assert_eq!(
            reporter.successes(),
            vec![format!("{} <-tmp->", pattern).as_str()]
        );
    }
}
