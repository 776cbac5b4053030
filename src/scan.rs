//! Tree scanning
//!
//! Walks the root directory depth-first and yields a [`FileRecord`] for every
//! file the metadata reader can date. The output folder and entries starting
//! with a skip prefix are never visited, so files relocated by an earlier run
//! are not classified again.

use crate::config::Config;
use crate::time::{DateKey, MetadataReader, classify};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// A classified file and where it belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Current location
    pub source: PathBuf,
    /// `<root>/<output>/<date key>/<file name>`
    pub destination: PathBuf,
    /// Date folder the file belongs to
    pub date_key: DateKey,
}

/// Produces classified file records for one configuration
pub struct Scanner<'a> {
    config: &'a Config,
    reader: &'a dyn MetadataReader,
    output_root: PathBuf,
    skip_prefixes: Vec<&'a str>,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a Config, reader: &'a dyn MetadataReader) -> Self {
        Self {
            config,
            reader,
            output_root: config.output_root(),
            skip_prefixes: config
                .skip_prefixes
                .iter()
                .map(String::as_str)
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Start a lazy depth-first scan of the root directory
    pub fn scan(&self) -> Scan<'_> {
        Scan {
            scanner: self,
            walker: WalkDir::new(&self.config.root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter(),
            files_seen: 0,
            errors: 0,
        }
    }

    /// Check if an entry below the root must not be visited
    fn is_excluded(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();

        if entry.file_type().is_dir()
            && (name == self.config.output_folder.as_str() || entry.path() == self.output_root)
        {
            debug!(path = ?entry.path(), "Skipping output folder");
            return true;
        }

        if let Some(prefix) = self.skip_prefixes.iter().find(|p| name.starts_with(**p)) {
            trace!(path = ?entry.path(), prefix, "Skipping hidden or reserved entry");
            return true;
        }

        false
    }

    /// Build the record for a file, if it has a capture time
    fn classify_file(&self, path: &Path) -> Option<FileRecord> {
        let timestamp = self.reader.read_capture_time(path)?;
        let file_name = path.file_name()?;
        let date_key = classify(&timestamp, self.config.granularity);
        let destination = self.output_root.join(&date_key).join(file_name);

        trace!(?path, %date_key, "Classified file");

        Some(FileRecord {
            source: path.to_path_buf(),
            destination,
            date_key,
        })
    }
}

/// Iterator over the classified files of a tree
pub struct Scan<'a> {
    scanner: &'a Scanner<'a>,
    walker: walkdir::IntoIter,
    files_seen: usize,
    errors: usize,
}

impl Scan<'_> {
    /// Regular files examined so far
    pub fn files_seen(&self) -> usize {
        self.files_seen
    }

    /// Entries that could not be read so far
    pub fn errors(&self) -> usize {
        self.errors
    }
}

impl Iterator for Scan<'_> {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    // An unreadable directory is not descended into; carry on
                    // with its siblings.
                    warn!(path = ?e.path(), error = %e, "Failed to read entry, skipping");
                    self.errors += 1;
                    continue;
                }
            };

            if entry.depth() > 0 && self.scanner.is_excluded(&entry) {
                if entry.file_type().is_dir() {
                    self.walker.skip_current_dir();
                }
                continue;
            }

            if entry.file_type().is_dir() {
                if tracing::enabled!(Level::DEBUG) {
                    let entries = fs::read_dir(entry.path()).map_or(0, |dir| dir.count());
                    debug!(path = ?entry.path(), entries, "Entering directory");
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            self.files_seen += 1;
            if let Some(record) = self.scanner.classify_file(entry.path()) {
                return Some(record);
            }
        }
    }
}
