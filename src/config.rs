//! Configuration types for picgroup

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Upper bound for the auto-detected worker count. Relocation is disk-bound,
/// so more workers than this only adds contention.
pub const MAX_DEFAULT_WORKERS: usize = 16;

/// Open transfers allowed per worker when `max_inflight` is left on auto
pub const INFLIGHT_PER_WORKER: usize = 2;

/// Precision at which files are bucketed into date folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One folder per calendar day: YYYYMMDD
    #[default]
    #[value(alias = "ymd")]
    #[serde(alias = "ymd")]
    Day,
    /// One folder per calendar month: YYYYMM
    #[value(alias = "ym")]
    #[serde(alias = "ym")]
    Month,
}

/// What happens to the source file once its destination is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Duplicate the file and keep the source
    Copy,
    /// Relocate the file, removing the source
    #[default]
    Move,
}

/// How relocations are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// One record at a time, in scan order, on the calling thread
    #[default]
    #[value(alias = "seq")]
    #[serde(alias = "seq")]
    Sequential,
    /// A bounded pool of workers draining a shared queue
    #[value(alias = "con")]
    #[serde(alias = "con")]
    Parallel,
}

/// Traversal strategy used by the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    /// Scan the whole tree, then provision and relocate everything at once.
    /// Memory grows with the number of classified files.
    Eager,
    /// Relocate in fixed-size batches while the tree is being scanned.
    /// Memory stays bounded by the batch size.
    #[default]
    Streaming,
}

/// What to do when the destination file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the source in place and report the record as skipped
    #[default]
    Skip,
    /// Replace the existing destination file
    Overwrite,
}

/// How much the binary reports about a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Warnings and errors only
    #[value(alias = "0")]
    #[serde(alias = "0")]
    Off,
    /// Per-file and per-batch progress logging plus the summary
    #[value(alias = "1")]
    #[serde(alias = "1")]
    Progress,
    /// Summary counts at the end of the run
    #[default]
    #[value(alias = "2")]
    #[serde(alias = "2")]
    Summary,
}

/// Configuration for one run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory to scan; classified files end up below it
    pub root: PathBuf,

    /// Name of the folder (directly under `root`) that receives date folders
    pub output_folder: String,

    /// Date folder granularity
    pub granularity: Granularity,

    /// Copy or move
    pub transfer: TransferMode,

    /// Sequential or parallel relocation
    pub concurrency: ConcurrencyMode,

    /// Worker count for parallel mode (0 = auto)
    pub workers: usize,

    /// Eager or streaming traversal
    pub strategy: ScanStrategy,

    /// Records per batch in streaming mode
    pub batch_size: usize,

    /// Maximum transfers with open file handles (0 = 2 per worker)
    pub max_inflight: usize,

    /// Policy for destinations that already exist
    pub on_conflict: ConflictPolicy,

    /// Entries whose name starts with one of these are never visited
    pub skip_prefixes: Vec<String>,

    /// File extensions the metadata reader attempts (case-insensitive)
    pub extensions: Vec<String>,

    /// Reporting level
    pub verbosity: Verbosity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            output_folder: "generated".into(),
            granularity: Granularity::default(),
            transfer: TransferMode::default(),
            concurrency: ConcurrencyMode::default(),
            workers: 0, // Auto-detect
            strategy: ScanStrategy::default(),
            batch_size: 100,
            max_inflight: 0,
            on_conflict: ConflictPolicy::default(),
            skip_prefixes: vec![".".into(), "@".into()],
            extensions: vec![
                "jpg".into(), "jpeg".into(), "png".into(), "arw".into(),
                "tif".into(), "tiff".into(), "heic".into(), "heif".into(),
                "dng".into(),
            ],
            verbosity: Verbosity::default(),
        }
    }
}

impl Config {
    /// Create a configuration for `root` with every other option at its default
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Check the configuration before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::Config("root path is not set".into()));
        }
        if !self.root.exists() {
            return Err(Error::Config(format!(
                "root path does not exist: {}",
                self.root.display()
            )));
        }
        if !self.root.is_dir() {
            return Err(Error::Config(format!(
                "root path is not a directory: {}",
                self.root.display()
            )));
        }

        let name = self.output_folder.as_str();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "output folder must be a single folder name, got {:?}",
                self.output_folder
            )));
        }

        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be greater than zero".into()));
        }

        Ok(())
    }

    /// Full path of the output folder
    pub fn output_root(&self) -> PathBuf {
        self.root.join(&self.output_folder)
    }

    /// Worker count for parallel mode
    ///
    /// An explicit count is used as given; auto-detection uses the host
    /// parallelism capped at [`MAX_DEFAULT_WORKERS`].
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }

        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .min(MAX_DEFAULT_WORKERS)
    }

    /// Limit for transfers with open file handles
    pub fn effective_inflight(&self) -> usize {
        if self.max_inflight > 0 {
            self.max_inflight
        } else {
            self.effective_workers() * INFLIGHT_PER_WORKER
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# picgroup configuration file
# This file uses TOML format (https://toml.io)

# Directory to scan. Classified files are placed below it.
root = "/home/me/Pictures/camera-roll"

# Folder created directly under root that receives the date folders
output_folder = "generated"

# Date folder granularity: "day" (YYYYMMDD) or "month" (YYYYMM)
granularity = "day"

# File operation: "copy" or "move"
transfer = "move"

# Relocation scheduling: "sequential" or "parallel"
concurrency = "sequential"

# Worker threads for parallel mode (0 = auto-detect, capped at 16)
workers = 0

# Traversal strategy
# - eager: scan everything first, then relocate
# - streaming: relocate in batches while scanning (bounded memory)
strategy = "streaming"

# Records per batch in streaming mode
batch_size = 100

# Maximum transfers with open file handles (0 = 2 per worker)
max_inflight = 0

# When the destination already exists: "skip" or "overwrite"
on_conflict = "skip"

# Files and folders starting with these prefixes are never visited
skip_prefixes = [".", "@"]

# Extensions the EXIF reader attempts (case-insensitive)
extensions = ["jpg", "jpeg", "png", "arw", "tif", "tiff", "heic", "heif", "dng"]

# Reporting: "off" (0), "progress" (1) or "summary" (2)
verbosity = "summary"
"#
        .to_string()
    }
}

/// Errors that can occur when loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output_folder, "generated");
        assert_eq!(config.granularity, Granularity::Day);
        assert_eq!(config.transfer, TransferMode::Move);
        assert_eq!(config.concurrency, ConcurrencyMode::Sequential);
        assert_eq!(config.on_conflict, ConflictPolicy::Skip);
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config::for_root("/definitely/not/a/real/path/for/picgroup");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_file_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("photo.jpg");
        fs::write(&file, b"x").unwrap();

        let config = Config::for_root(&file);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_output_folder_name() {
        let dir = tempdir().unwrap();
        let mut config = Config::for_root(dir.path());
        assert!(config.validate().is_ok());

        for bad in ["", ".", "..", "a/b", "a\\b"] {
            config.output_folder = bad.into();
            assert!(config.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_validate_batch_size() {
        let dir = tempdir().unwrap();
        let mut config = Config::for_root(dir.path());
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers() {
        let mut config = Config::default();
        let auto = config.effective_workers();
        assert!(auto >= 1 && auto <= MAX_DEFAULT_WORKERS);

        config.workers = 32;
        assert_eq!(config.effective_workers(), 32);
        assert_eq!(config.effective_inflight(), 64);

        config.max_inflight = 3;
        assert_eq!(config.effective_inflight(), 3);
    }

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::sample_config()).unwrap();
        assert_eq!(config.output_folder, "generated");
        assert_eq!(config.strategy, ScanStrategy::Streaming);
        assert_eq!(config.skip_prefixes, vec![".", "@"]);
    }

    #[test]
    fn test_load_from_file_with_aliases() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("picgroup.toml");
        fs::write(
            &path,
            "root = \"/photos\"\ngranularity = \"ym\"\nconcurrency = \"con\"\ntransfer = \"copy\"\nverbosity = \"1\"\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/photos"));
        assert_eq!(config.granularity, Granularity::Month);
        assert_eq!(config.concurrency, ConcurrencyMode::Parallel);
        assert_eq!(config.transfer, TransferMode::Copy);
        assert_eq!(config.verbosity, Verbosity::Progress);
        // Unset keys fall back to defaults
        assert_eq!(config.output_folder, "generated");
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = Config::load_from_file("/no/such/picgroup.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
