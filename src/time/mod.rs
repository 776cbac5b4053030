//! Capture time extraction and date classification
//!
//! A [`MetadataReader`] turns a file path into an optional capture timestamp.
//! The production reader is [`ExifReader`]; the processor accepts any
//! implementation so it can be driven without real image files.

pub mod exif;
pub mod key;

pub use key::{DateKey, classify};

use crate::config::Config;
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::{debug, trace};

/// Source of capture timestamps
pub trait MetadataReader: Send + Sync {
    /// Capture time of the file at `path`, or `None` when the file type is
    /// unsupported or carries no usable date
    fn read_capture_time(&self, path: &Path) -> Option<NaiveDateTime>;
}

/// Reads capture times from EXIF metadata for an allow-list of extensions
#[derive(Debug, Clone)]
pub struct ExifReader {
    extensions: Vec<String>,
}

impl ExifReader {
    /// Create a reader that only attempts the given extensions
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Create a reader using the extension allow-list from the config
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.extensions)
    }

    /// Check whether the file extension is in the allow-list
    pub fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}

impl MetadataReader for ExifReader {
    fn read_capture_time(&self, path: &Path) -> Option<NaiveDateTime> {
        if !self.supports(path) {
            trace!(?path, "File type not supported, skipping");
            return None;
        }

        match exif::extract_exif_time(path) {
            Ok(time) => Some(time),
            Err(e) => {
                debug!(?path, error = %e, "No capture time available");
                None
            }
        }
    }
}

/// Dates files by a leading `YYYYMMDD` in their name, e.g. `20240305_a.jpg`.
/// Anything else has no capture time.
#[cfg(test)]
pub(crate) struct NameDateReader;

#[cfg(test)]
impl MetadataReader for NameDateReader {
    fn read_capture_time(&self, path: &Path) -> Option<NaiveDateTime> {
        let name = path.file_name()?.to_str()?;
        let date = chrono::NaiveDate::parse_from_str(name.get(..8)?, "%Y%m%d").ok()?;
        date.and_hms_opt(12, 0, 0)
    }
}
