//! picgroup - group photos into date-named folders
//!
//! This library walks a directory tree, reads the capture time of every
//! supported image and relocates it into `<root>/<output>/<date>/`:
//! - EXIF capture time extraction (kamadak-exif)
//! - Day or month folder granularity
//! - Eager or streaming (batched, bounded memory) traversal
//! - Sequential or parallel relocation with Rayon and a bounded queue
//! - Copy or move, with a cross-volume fallback for moves

pub mod cli;
pub mod config;
pub mod error;
pub mod process;
pub mod provision;
pub mod relocate;
pub mod scan;
pub mod time;

pub use cli::Cli;
pub use config::{
    ConcurrencyMode, Config, ConfigError, ConflictPolicy, Granularity, ScanStrategy, TransferMode,
    Verbosity,
};
pub use error::{Error, Result};
pub use process::{Phase, Processor, RunReport};
pub use relocate::{RelocationResult, RelocationStatus, WorkerPool};
pub use scan::{FileRecord, Scanner};
pub use time::{DateKey, ExifReader, MetadataReader, classify};
