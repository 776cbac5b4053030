//! Output folder provisioning
//!
//! Folders are created one level at a time, so the output root has to exist
//! before any date folder below it can be created.

use crate::error::{Error, Result};
use crate::time::DateKey;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Outcome of [`FolderProvisioner::ensure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyExisted,
}

/// Counts for one provisioning pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Creates the output root and its date folders
#[derive(Debug, Clone)]
pub struct FolderProvisioner {
    output_root: PathBuf,
}

impl FolderProvisioner {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Make sure `path` exists as a directory. Calling it again is a no-op.
    pub fn ensure(path: &Path) -> io::Result<Provisioned> {
        match fs::create_dir(path) {
            Ok(()) => Ok(Provisioned::Created),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if path.is_dir() {
                    Ok(Provisioned::AlreadyExisted)
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists and is not a directory", path.display()),
                    ))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Create the output root. Without it nothing can be relocated, so a
    /// failure here ends the run.
    pub fn ensure_output_root(&self) -> Result<Provisioned> {
        let outcome = Self::ensure(&self.output_root).map_err(|e| Error::OutputRoot {
            path: self.output_root.clone(),
            source: e,
        })?;
        debug!(path = ?self.output_root, ?outcome, "Output folder ready");
        Ok(outcome)
    }

    /// Create a folder for every date key. Failures are logged and counted;
    /// files bound for a missing folder fail individually later.
    pub fn provision<'k, I>(&self, keys: I) -> ProvisionReport
    where
        I: IntoIterator<Item = &'k DateKey>,
    {
        let mut report = ProvisionReport::default();

        for key in keys {
            let path = self.output_root.join(key);
            match Self::ensure(&path) {
                Ok(Provisioned::Created) => {
                    debug!(?path, "Created date folder");
                    report.created += 1;
                }
                Ok(Provisioned::AlreadyExisted) => report.existing += 1,
                Err(e) => {
                    let e = Error::Provision { path, source: e };
                    error!(error = %e, "Failed to create date folder");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
