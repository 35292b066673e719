//! Pattern-based copying.
//!
//! A glob mapping selects its sources with a shell pattern (`*`, `?`, `[...]`)
//! instead of naming them. Wildcards never cross a `/`: `**` matches exactly like
//! `*`, inside a single path component. Each match is copied with its own name preserved under
//! the destination root, and the configured filter prunes entries inside matched
//! directories. Restoring mirrors this: the backup destination is walked back into
//! the directory the pattern lives in.

use crate::config::GlobTarget;
use crate::file_copier::{FileCopier, PathFilter, TaskError, TaskResult, WalkReport, resolve_path};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Copies everything matching `source_pattern` into `target.dst`.
///
/// Every match is walked with its parent directory as the source root, so
/// `logs/a.log` lands at `<dst>/a.log` and a matched directory `logs/app`
/// lands at `<dst>/app`. No matches is not an error.
///
/// # Errors
///
/// Fails on an invalid pattern or filter, and with the first error of any match;
/// matches after a failing one are not attempted.
///
/// # Examples
///
/// ```no_run
/// use bonclay::config::GlobTarget;
/// use bonclay::glob_copier::copy_glob;
///
/// let target = GlobTarget {
///     dst: "/backup/logs".to_string(),
///     filter: r"\.tmp$".to_string(),
/// };
/// match copy_glob("/var/log/app/*.log", &target, false) {
///     Ok(report) => println!("Copied {} files", report.copied_files),
///     Err(e) => eprintln!("Backup failed: {}", e),
/// }
/// ```
pub fn copy_glob(
    source_pattern: &str,
    target: &GlobTarget,
    overwrite: bool,
) -> TaskResult<WalkReport> {
    let pattern = resolve_path(source_pattern)?;
    let destination_root = resolve_path(&target.dst)?;
    let filter = PathFilter::new(&target.filter)?;
    info!(
        "Copying matches of {} to {}",
        pattern.display(),
        destination_root.display()
    );

    let mut report = WalkReport::default();
    for matched in expand(&pattern)? {
        let source_root = matched.parent().unwrap_or(&matched);
        report.merge(FileCopier::walk(
            source_root,
            &matched,
            &destination_root,
            &filter,
            overwrite,
        )?);
    }

    Ok(report)
}

/// Copies a glob mapping's backup back to where the pattern points.
///
/// `target.dst` is walked (it may itself contain wildcards) and its contents are
/// placed in the parent directory of `destination_pattern`. The filter applies
/// the same way it does when backing up.
///
/// # Errors
///
/// Same as [`copy_glob`].
pub fn restore_glob(
    target: &GlobTarget,
    destination_pattern: &str,
    overwrite: bool,
) -> TaskResult<WalkReport> {
    let source = resolve_path(&target.dst)?;
    let destination = resolve_path(destination_pattern)?;
    let destination_root = destination.parent().unwrap_or(&destination);
    let filter = PathFilter::new(&target.filter)?;
    info!(
        "Restoring {} to {}",
        source.display(),
        destination_root.display()
    );

    let mut report = WalkReport::default();
    for matched in expand(&source)? {
        report.merge(FileCopier::walk(
            &matched,
            &matched,
            destination_root,
            &filter,
            overwrite,
        )?);
    }

    Ok(report)
}

/// Lists the paths matching `pattern` in sorted order.
///
/// Directories that cannot be read while matching are logged and skipped.
fn expand(pattern: &Path) -> TaskResult<Vec<PathBuf>> {
    let pattern_str = pattern.to_str().ok_or_else(|| TaskError::InvalidPattern {
        pattern: pattern.to_string_lossy().to_string(),
        reason: "pattern is not valid UTF-8".to_string(),
    })?;
    let single_segment = collapse_stars(pattern_str);

    let paths = glob::glob(&single_segment).map_err(|e| TaskError::InvalidPattern {
        pattern: pattern_str.to_string(),
        reason: e.to_string(),
    })?;

    let matches = paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping {} while matching: {}", e.path().display(), e.error());
                None
            }
        })
        .collect::<Vec<_>>();
    debug!("{} matched {} path(s)", pattern_str, matches.len());

    Ok(matches)
}

/// Replaces every run of `*` with a single `*`.
///
/// The `glob` crate treats a `**` component as "any number of directories".
fn collapse_stars(pattern: &str) -> String {
    let mut collapsed = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}
