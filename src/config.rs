//! Backup configuration.
//!
//! This module loads the mapping of sources to destinations from a TOML file.
//! It supports two kinds of mappings:
//! - Exact `source = "destination"` pairs under `[spec]`
//! - Pattern-based mappings under `[glob]`, each with a destination and an
//!   optional exclusion filter
//!
//! # Configuration File Format
//!
//! ```toml
//! [backup]
//! overwrite = true
//!
//! [restore]
//! overwrite = false
//!
//! [spec]
//! "~/.vimrc" = "~/dotfiles/vimrc"
//! "~/.config/nvim" = "~/dotfiles/nvim"
//!
//! [glob."~/notes/*.md"]
//! dst = "~/dotfiles/notes"
//! filter = "draft;\\.swp$"
//! ```
//!
//! Paths may start with `~` and may be relative to the working directory.
//! `filter` is a `;`-separated list of regular expressions matched against paths
//! relative to the matched entry's parent.

use crate::file_copier::{PathFilter, TaskError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "bonclay.toml";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// A mapping has an empty source or destination.
    EmptyPath {
        /// The section the mapping lives in.
        section: &'static str,
        /// The mapping's key.
        key: String,
    },
    /// Invalid regex pattern provided with the actual error reason.
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// Refused to replace an existing file with the template.
    AlreadyExists(PathBuf),
    /// IO error while reading or writing configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::EmptyPath { section, key } => {
                write!(f, "Empty path in [{}] mapping '{}'", section, key)
            }
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::AlreadyExists(path) => {
                write!(f, "Refusing to overwrite existing file: {}", path.display())
            }
            ConfigError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Per-direction options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Whether existing destinations may be reused or replaced.
    #[serde(default)]
    pub overwrite: bool,
}

/// Destination side of a glob mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobTarget {
    /// Directory the matches are copied into.
    pub dst: String,
    /// `;`-separated exclusion regexes. Empty means no filtering.
    #[serde(default)]
    pub filter: String,
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub backup: TaskOptions,

    #[serde(default)]
    pub restore: TaskOptions,

    /// Exact source to destination pairs.
    #[serde(default)]
    pub spec: BTreeMap<String, String>,

    /// Source pattern to destination mappings.
    #[serde(default)]
    pub glob: BTreeMap<String, GlobTarget>,
}

impl Configuration {
    /// Load configuration from a file.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `bonclay.toml` in the current directory
    /// 3. Look for `~/.config/bonclay/config.toml` in home directory
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if no file is found, and any error
    /// from parsing or validating the file that was picked.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(home_config) = Self::home_config_path()
            && home_config.exists()
        {
            return Self::load_from_file(&home_config);
        }

        Err(ConfigError::ConfigNotFound(local_config))
    }

    /// Returns `~/.config/bonclay/config.toml` if `HOME` is set.
    fn home_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("bonclay")
                .join("config.toml")
        })
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::IoError` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config = Self::parse(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Parses TOML text without validating it.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Checks that every mapping names both sides and every filter compiles.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyPath` or `ConfigError::InvalidRegexPattern`
    /// for the first offending mapping.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (source, destination) in &self.spec {
            if source.is_empty() || destination.is_empty() {
                return Err(ConfigError::EmptyPath {
                    section: "spec",
                    key: source.clone(),
                });
            }
        }

        for (pattern, target) in &self.glob {
            if pattern.is_empty() || target.dst.is_empty() {
                return Err(ConfigError::EmptyPath {
                    section: "glob",
                    key: pattern.clone(),
                });
            }

            PathFilter::new(&target.filter).map_err(|e| match e {
                TaskError::InvalidFilter { pattern, reason } => {
                    ConfigError::InvalidRegexPattern { pattern, reason }
                }
                other => ConfigError::ConfigInvalid(other.to_string()),
            })?;
        }

        Ok(())
    }

    /// Returns true if there is nothing to back up or restore.
    pub fn is_empty(&self) -> bool {
        self.spec.is_empty() && self.glob.is_empty()
    }

    /// A commented starting point for a new configuration file.
    pub fn template() -> &'static str {
        r#"# bonclay configuration
#
# Paths may start with "~" and may be relative to the current directory.

[backup]
# Replace files that already exist at the destination.
overwrite = false

[restore]
# Restoring into directories that already exist, such as the parent of a
# [glob] pattern, needs this set to true.
overwrite = false

# Exact source = "destination" pairs. Directories are copied recursively.
[spec]
# "~/.vimrc" = "~/dotfiles/vimrc"
# "~/.config/nvim" = "~/dotfiles/nvim"

# Pattern-based sources. Matches keep their names under dst.
# filter holds ";"-separated regexes; matching relative paths are skipped.
# [glob."~/notes/*.md"]
# dst = "~/dotfiles/notes"
# filter = "draft;\\.swp$"
"#
    }

    /// Writes [`Configuration::template`] to `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AlreadyExists` if `path` exists, or `ConfigError::IoError`
    /// if writing fails.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        fs::write(path, Self::template()).map_err(|e| ConfigError::IoError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_is_default() {
        let config = Configuration::parse("").unwrap();
        assert_eq!(config, Configuration::default());
        assert!(config.is_empty());
        assert!(!config.backup.overwrite);
        assert!(!config.restore.overwrite);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Configuration::parse(
            r#"
            [backup]
            overwrite = true

            [restore]
            overwrite = false

            [spec]
            "~/.vimrc" = "/backup/vimrc"

            [glob."logs/*.log"]
            dst = "archive"
            filter = "tmp;cache"
            "#,
        )
        .unwrap();

        assert!(config.backup.overwrite);
        assert!(!config.restore.overwrite);
        assert_eq!(config.spec.get("~/.vimrc").unwrap(), "/backup/vimrc");

        let target = config.glob.get("logs/*.log").unwrap();
        assert_eq!(target.dst, "archive");
        assert_eq!(target.filter, "tmp;cache");
    }

    #[test]
    fn test_glob_filter_defaults_to_empty() {
        let config = Configuration::parse(
            r#"
            [glob."*.txt"]
            dst = "out"
            "#,
        )
        .unwrap();

        assert_eq!(config.glob.get("*.txt").unwrap().filter, "");
    }

    #[test]
    fn test_glob_without_dst_is_invalid() {
        let result = Configuration::parse(
            r#"
            [glob."*.txt"]
            filter = "x"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_spec_iterates_in_key_order() {
        let config = Configuration::parse(
            r#"
            [spec]
            "b" = "2"
            "a" = "1"
            "c" = "3"
            "#,
        )
        .unwrap();

        let keys: Vec<_> = config.spec.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_validate_rejects_invalid_filter() {
        let config = Configuration::parse(
            r#"
            [glob."*.txt"]
            dst = "out"
            filter = "ok;[broken("
            "#,
        )
        .unwrap();

        match config.validate() {
            Err(ConfigError::InvalidRegexPattern { pattern, .. }) => {
                assert_eq!(pattern, "[broken(")
            }
            other => panic!("Expected InvalidRegexPattern, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_empty_destination() {
        let config = Configuration::parse(
            r#"
            [spec]
            "src" = ""
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyPath { section: "spec", .. })
        ));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = Configuration::load(Some(Path::new("/non/existent/bonclay.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_template_parses_and_validates() {
        let config = Configuration::parse(Configuration::template()).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.is_empty());
    }

    #[test]
    fn test_write_template_refuses_existing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("bonclay.toml");

        Configuration::write_template(&path).expect("First write should succeed");
        let loaded = Configuration::load(Some(&path)).expect("Template should load");
        assert!(loaded.is_empty());

        let result = Configuration::write_template(&path);
        assert!(matches!(result, Err(ConfigError::AlreadyExists(_))));
    }
}
