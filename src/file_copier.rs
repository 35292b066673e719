/// Tree copying engine used by both backup and restore.
///
/// This module walks a source tree, maps every entry onto the destination tree by
/// swapping the source root prefix for the destination root, and then creates
/// directories or copies files as needed. Symlinks are never copied, existing
/// destinations are only touched when overwriting is enabled, and entries whose
/// relative path matches the configured filter are left out together with their
/// subtree.
use regex::Regex;
use std::env;
use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Errors that can occur while copying a single mapping entry.
///
/// Every variant carries the path it is about, and the I/O error behind it when
/// there is one. Apart from [`TaskError::LinkSkip`], any of these aborts the walk
/// that produced it.
#[derive(Debug)]
pub enum TaskError {
    /// The source entry does not exist.
    SourceNotExist(PathBuf),
    /// The source entry could not be read.
    SourceProblem { path: PathBuf, source: io::Error },
    /// The source entry is a symbolic link and was skipped.
    LinkSkip(PathBuf),
    /// The destination already exists and overwriting is disabled.
    DestinationExists(PathBuf),
    /// A symlink sitting at the destination could not be removed.
    ExistDeleteFail { path: PathBuf, source: io::Error },
    /// A destination directory could not be created.
    DirCreateFail { path: PathBuf, source: io::Error },
    /// The parent of a destination file could not be inspected.
    DestinationParentProblem { path: PathBuf, source: io::Error },
    /// The destination could not be inspected.
    DestinationProblem { path: PathBuf, source: io::Error },
    /// Setting permissions, opening or streaming a file failed.
    FileCopyFail { path: PathBuf, source: io::Error },
    /// One of the `;`-separated filter alternatives is not a valid regex.
    InvalidFilter { pattern: String, reason: String },
    /// A glob pattern could not be parsed.
    InvalidPattern { pattern: String, reason: String },
    /// A configured path could not be turned into an absolute path.
    PathResolveFail { path: String, reason: String },
}

impl TaskError {
    /// Returns false for errors that only skip the current entry.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::LinkSkip(_))
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceNotExist(path) => {
                write!(f, "Source does not exist: {}", path.display())
            }
            Self::SourceProblem { path, source } => {
                write!(f, "Could not read source {}: {}", path.display(), source)
            }
            Self::LinkSkip(path) => {
                write!(f, "Skipped symbolic link: {}", path.display())
            }
            Self::DestinationExists(path) => {
                write!(
                    f,
                    "Destination already exists (overwrite disabled): {}",
                    path.display()
                )
            }
            Self::ExistDeleteFail { path, source } => {
                write!(
                    f,
                    "Could not remove existing symlink {}: {}",
                    path.display(),
                    source
                )
            }
            Self::DirCreateFail { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::DestinationParentProblem { path, source } => {
                write!(
                    f,
                    "Could not inspect destination parent {}: {}",
                    path.display(),
                    source
                )
            }
            Self::DestinationProblem { path, source } => {
                write!(
                    f,
                    "Could not inspect destination {}: {}",
                    path.display(),
                    source
                )
            }
            Self::FileCopyFail { path, source } => {
                write!(f, "Failed to copy file to {}: {}", path.display(), source)
            }
            Self::InvalidFilter { pattern, reason } => {
                write!(f, "Invalid filter pattern '{}': {}", pattern, reason)
            }
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "Invalid glob pattern '{}': {}", pattern, reason)
            }
            Self::PathResolveFail { path, reason } => {
                write!(f, "Could not resolve path '{}': {}", path, reason)
            }
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SourceProblem { source, .. }
            | Self::ExistDeleteFail { source, .. }
            | Self::DirCreateFail { source, .. }
            | Self::DestinationParentProblem { source, .. }
            | Self::DestinationProblem { source, .. }
            | Self::FileCopyFail { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for copy operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// Compiled exclusion filter.
///
/// Built from a `;`-separated list of regular expressions. A relative path is
/// excluded when any alternative matches anywhere inside it; the match is not
/// anchored. Empty alternatives are ignored, so an empty filter excludes nothing.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    alternatives: Vec<Regex>,
}

impl PathFilter {
    /// Compiles a filter string.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::InvalidFilter` for the first alternative that is not a
    /// valid regular expression.
    pub fn new(filter: &str) -> TaskResult<Self> {
        let alternatives = filter
            .split(';')
            .filter(|alternative| !alternative.is_empty())
            .map(|alternative| {
                Regex::new(alternative).map_err(|e| TaskError::InvalidFilter {
                    pattern: alternative.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { alternatives })
    }

    /// A filter that excludes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if no alternatives are configured.
    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Checks a path relative to the source root against every alternative.
    ///
    /// Components are joined with `/` regardless of platform before matching.
    pub fn is_excluded(&self, relative_path: &Path) -> bool {
        if self.alternatives.is_empty() {
            return false;
        }

        let relative = relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        self.alternatives.iter().any(|regex| regex.is_match(&relative))
    }
}

/// Summary of a finished walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Number of files copied.
    pub copied_files: usize,
    /// Number of destination directories created.
    pub created_dirs: usize,
    /// Source symlinks that were left out.
    pub skipped_links: Vec<PathBuf>,
}

impl WalkReport {
    /// Folds another report into this one.
    pub fn merge(&mut self, other: WalkReport) {
        self.copied_files += other.copied_files;
        self.created_dirs += other.created_dirs;
        self.skipped_links.extend(other.skipped_links);
    }
}

/// What a source entry turns into on the destination side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File,
}

/// What happened to a single visited entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Filtered,
    Directory { created: bool },
    Copied,
}

/// Copies source trees onto destination trees.
pub struct FileCopier;

impl FileCopier {
    /// Walks `start` and mirrors it below `destination_root`.
    ///
    /// `start` must be `source_root` itself or lie beneath it; every visited
    /// entry is placed at `destination_root` joined with its path relative to
    /// `source_root`. Entries are visited in pre-order, sorted by file name, and
    /// symlinks are never followed, not even when `start` is one.
    ///
    /// # Arguments
    ///
    /// * `source_root` - The prefix stripped from every visited path
    /// * `start` - Where the walk begins
    /// * `destination_root` - The prefix every destination path is built on
    /// * `filter` - Relative paths matching this filter are skipped with their subtree
    /// * `overwrite` - Whether existing destinations may be reused or replaced
    ///
    /// # Returns
    ///
    /// Returns a `WalkReport` on success. The first fatal error stops the walk and
    /// is returned; anything created before it stays in place.
    pub fn walk(
        source_root: &Path,
        start: &Path,
        destination_root: &Path,
        filter: &PathFilter,
        overwrite: bool,
    ) -> TaskResult<WalkReport> {
        let mut report = WalkReport::default();
        let mut entries = WalkDir::new(start)
            .follow_links(false)
            .follow_root_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry.map_err(|e| Self::source_error(start, e))?;
            let metadata = entry
                .metadata()
                .map_err(|e| Self::source_error(entry.path(), e))?;

            match Self::visit(
                source_root,
                entry.path(),
                &metadata,
                destination_root,
                filter,
                overwrite,
            ) {
                Ok(Visit::Filtered) => {
                    debug!("Filtered out {}", entry.path().display());
                    if metadata.is_dir() {
                        entries.skip_current_dir();
                    }
                }
                Ok(Visit::Directory { created }) => {
                    if created {
                        report.created_dirs += 1;
                    }
                }
                Ok(Visit::Copied) => report.copied_files += 1,
                Err(err) if !err.is_fatal() => {
                    warn!("{}", err);
                    report.skipped_links.push(entry.path().to_path_buf());
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }

    /// Decides what to do with one entry and does it.
    fn visit(
        source_root: &Path,
        path: &Path,
        metadata: &fs::Metadata,
        destination_root: &Path,
        filter: &PathFilter,
        overwrite: bool,
    ) -> TaskResult<Visit> {
        if metadata.file_type().is_symlink() {
            return Err(TaskError::LinkSkip(path.to_path_buf()));
        }

        let relative = path.strip_prefix(source_root).unwrap_or(path);
        if !relative.as_os_str().is_empty() && filter.is_excluded(relative) {
            return Ok(Visit::Filtered);
        }

        let destination = if relative.as_os_str().is_empty() {
            destination_root.to_path_buf()
        } else {
            destination_root.join(relative)
        };

        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let permissions = metadata.permissions();
        let created = Self::prepare_destination(&destination, kind, &permissions, overwrite)?;

        match kind {
            EntryKind::Directory => Ok(Visit::Directory { created }),
            EntryKind::File => {
                Self::copy_file(path, &destination, &permissions)?;
                debug!("Copied {} to {}", path.display(), destination.display());
                Ok(Visit::Copied)
            }
        }
    }

    /// Brings the destination into a state where `kind` can be written to it.
    ///
    /// Returns true if a directory was created for a directory entry.
    fn prepare_destination(
        destination: &Path,
        kind: EntryKind,
        permissions: &Permissions,
        overwrite: bool,
    ) -> TaskResult<bool> {
        match fs::symlink_metadata(destination) {
            Ok(existing) => {
                if !overwrite {
                    return Err(TaskError::DestinationExists(destination.to_path_buf()));
                }

                if existing.is_file() && kind == EntryKind::File {
                    Self::make_owner_writable(destination, existing.permissions())?;
                }
                if !existing.file_type().is_symlink() {
                    return Ok(false);
                }

                fs::remove_file(destination).map_err(|e| TaskError::ExistDeleteFail {
                    path: destination.to_path_buf(),
                    source: e,
                })?;
                debug!("Removed symlink at {}", destination.display());

                if kind == EntryKind::Directory {
                    Self::create_directory(destination, permissions, false)?;
                    return Ok(true);
                }
                Ok(false)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => match kind {
                EntryKind::Directory => {
                    Self::create_directory(destination, permissions, true)?;
                    Ok(true)
                }
                EntryKind::File => {
                    Self::ensure_parent(destination)?;
                    Ok(false)
                }
            },
            Err(e) => Err(TaskError::DestinationProblem {
                path: destination.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Lets an existing read-only destination file be reopened for writing.
    ///
    /// The source's mode is applied again by `copy_file` afterwards.
    fn make_owner_writable(destination: &Path, permissions: Permissions) -> TaskResult<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if permissions.mode() & 0o200 != 0 {
                return Ok(());
            }
            let writable = Permissions::from_mode(permissions.mode() | 0o200);
            fs::set_permissions(destination, writable).map_err(|e| TaskError::FileCopyFail {
                path: destination.to_path_buf(),
                source: e,
            })?;
        }
        #[cfg(not(unix))]
        {
            if !permissions.readonly() {
                return Ok(());
            }
            let mut writable = permissions;
            #[allow(clippy::permissions_set_readonly_false)]
            writable.set_readonly(false);
            fs::set_permissions(destination, writable).map_err(|e| TaskError::FileCopyFail {
                path: destination.to_path_buf(),
                source: e,
            })?;
        }
        debug!("Made {} writable for overwrite", destination.display());

        Ok(())
    }

    /// Creates the parent directory of a destination file when it is missing.
    fn ensure_parent(destination: &Path) -> TaskResult<()> {
        let Some(parent) = destination.parent() else {
            return Ok(());
        };

        match fs::symlink_metadata(parent) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(parent).map_err(|e| TaskError::DirCreateFail {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
                debug!("Created parent directory {}", parent.display());
                Ok(())
            }
            Err(e) => Err(TaskError::DestinationParentProblem {
                path: parent.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Creates a directory carrying the source directory's mode bits.
    fn create_directory(
        path: &Path,
        permissions: &Permissions,
        recursive: bool,
    ) -> TaskResult<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(recursive);

        #[cfg(unix)]
        {
            use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
            builder.mode(permissions.mode() & 0o7777);
        }
        #[cfg(not(unix))]
        let _ = permissions;

        builder.create(path).map_err(|e| TaskError::DirCreateFail {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!("Created directory {}", path.display());

        Ok(())
    }

    /// Copies the contents of `source` into `destination`.
    ///
    /// The destination is created or truncated, starts out owner-write-only and
    /// then receives `permissions` before any data is written. Data is synced to
    /// disk before returning. Both handles are closed when they go out of scope,
    /// on success and on every error path.
    ///
    /// # Errors
    ///
    /// Any failure is reported as `TaskError::FileCopyFail` for the destination path.
    pub fn copy_file(
        source: &Path,
        destination: &Path,
        permissions: &Permissions,
    ) -> TaskResult<()> {
        let copy_fail = |e: io::Error| TaskError::FileCopyFail {
            path: destination.to_path_buf(),
            source: e,
        };

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o200);
        }

        let mut destination_file = options.open(destination).map_err(copy_fail)?;
        destination_file
            .set_permissions(permissions.clone())
            .map_err(copy_fail)?;

        let mut source_file = File::open(source).map_err(copy_fail)?;
        io::copy(&mut source_file, &mut destination_file).map_err(copy_fail)?;
        destination_file.sync_all().map_err(copy_fail)?;

        Ok(())
    }

    /// Classifies an error reported while reading the source tree.
    fn source_error(fallback: &Path, err: walkdir::Error) -> TaskError {
        let path = err.path().unwrap_or(fallback).to_path_buf();
        let not_found = err
            .io_error()
            .is_some_and(|e| e.kind() == ErrorKind::NotFound);

        if not_found {
            TaskError::SourceNotExist(path)
        } else {
            TaskError::SourceProblem {
                path,
                source: io::Error::from(err),
            }
        }
    }
}

/// Turns a configured path into an absolute one.
///
/// A leading `~` is replaced by the home directory taken from `HOME`; relative
/// paths are resolved against the current directory. `..` components are kept.
///
/// # Errors
///
/// Returns `TaskError::PathResolveFail` when the path is empty, `~` is used
/// without a home directory, or the current directory cannot be read.
pub fn resolve_path(path: &str) -> TaskResult<PathBuf> {
    let resolve_fail = |reason: String| TaskError::PathResolveFail {
        path: path.to_string(),
        reason,
    };

    let expanded = if path == "~" || path.starts_with("~/") {
        let home = env::var_os("HOME")
            .ok_or_else(|| resolve_fail("HOME is not set".to_string()))?;
        let mut home = PathBuf::from(home);
        if let Some(rest) = path.strip_prefix("~/") {
            home.push(rest);
        }
        home
    } else {
        PathBuf::from(path)
    };

    std::path::absolute(&expanded).map_err(|e| resolve_fail(e.to_string()))
}

/// Copies one exact `source -> destination` pair.
///
/// Both paths are resolved with [`resolve_path`] and the whole source is walked:
/// a file is copied to `destination`, a directory is mirrored as `destination`.
pub fn copy_spec(source: &str, destination: &str, overwrite: bool) -> TaskResult<WalkReport> {
    let source_root = resolve_path(source)?;
    let destination_root = resolve_path(destination)?;
    info!(
        "Copying {} to {}",
        source_root.display(),
        destination_root.display()
    );

    FileCopier::walk(
        &source_root,
        &source_root,
        &destination_root,
        &PathFilter::none(),
        overwrite,
    )
}
