//! CLI argument parsing with clap

use crate::config::{
    ConcurrencyMode, ConflictPolicy, Config, Granularity, ScanStrategy, TransferMode, Verbosity,
};
use clap::Parser;
use std::path::PathBuf;

/// picgroup - group photos into date folders
///
/// Reads the EXIF capture time of every supported file below a root
/// directory and moves (or copies) it into <root>/<output>/<date>/.
#[derive(Parser, Debug)]
#[command(name = "picgroup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// CLI arguments override settings from the file.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Root directory to organize
    #[arg(short = 'd', long, env = "PICGROUP_ROOT")]
    pub root: Option<PathBuf>,

    /// Date folder granularity (day = YYYYMMDD, month = YYYYMM)
    #[arg(short = 'f', long, value_enum)]
    pub granularity: Option<Granularity>,

    /// Name of the generated output folder
    #[arg(short = 't', long)]
    pub output_folder: Option<String>,

    /// Copy or move files
    #[arg(short = 'g', long, value_enum)]
    pub transfer: Option<TransferMode>,

    /// Sequential or parallel relocation
    #[arg(short = 'm', long, value_enum)]
    pub concurrency: Option<ConcurrencyMode>,

    /// Number of workers for parallel mode (0 = auto)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Traversal strategy
    #[arg(long, value_enum)]
    pub strategy: Option<ScanStrategy>,

    /// Records per batch in streaming mode
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Maximum transfers with open file handles (0 = 2 per worker)
    #[arg(long)]
    pub max_inflight: Option<usize>,

    /// What to do when a destination file already exists
    #[arg(long, value_enum)]
    pub on_conflict: Option<ConflictPolicy>,

    /// Reporting level
    #[arg(short = 'v', long, value_enum)]
    pub verbosity: Option<Verbosity>,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Output file logs as JSON
    #[arg(long)]
    pub json_log: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref root) = self.root {
            config.root = root.clone();
        }
        if let Some(granularity) = self.granularity {
            config.granularity = granularity;
        }
        if let Some(ref output_folder) = self.output_folder {
            config.output_folder = output_folder.clone();
        }
        if let Some(transfer) = self.transfer {
            config.transfer = transfer;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(max_inflight) = self.max_inflight {
            config.max_inflight = max_inflight;
        }
        if let Some(on_conflict) = self.on_conflict {
            config.on_conflict = on_conflict;
        }
        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
