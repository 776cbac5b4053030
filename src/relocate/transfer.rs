//! Single-file copy and move

use crate::config::TransferMode;
use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Size of the copy buffer (256KB)
const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// How a file reached its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Copied; the source is still in place
    Copied { bytes: u64 },
    /// Renamed within one volume
    Renamed,
    /// Copied to another volume, then the source was removed
    CopiedAcrossVolumes { bytes: u64 },
}

/// Copy or move `source` to `dest`, creating the destination folder if needed
pub fn transfer(source: &Path, dest: &Path, mode: TransferMode) -> Result<Transfer> {
    let wrap = |e: io::Error| Error::Relocation {
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
        source: e,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }

    match mode {
        TransferMode::Copy => copy(source, dest, false)
            .map(|bytes| Transfer::Copied { bytes })
            .map_err(wrap),
        TransferMode::Move => move_with(source, dest, |from, to| fs::rename(from, to)).map_err(wrap),
    }
}

/// Move by renaming, falling back to copy + delete when the rename crosses
/// a volume boundary. `rename` is injectable so the fallback can be tested.
fn move_with<F>(source: &Path, dest: &Path, rename: F) -> io::Result<Transfer>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    match rename(source, dest) {
        Ok(()) => Ok(Transfer::Renamed),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(?source, ?dest, "Rename crosses volumes, copying instead");
            let bytes = copy(source, dest, true)?;
            fs::remove_file(source)?;
            Ok(Transfer::CopiedAcrossVolumes { bytes })
        }
        Err(e) => Err(e),
    }
}

/// Copy file contents and modification time.
///
/// A destination created here is removed again if streaming fails. With
/// `durable` the data is synced to disk before returning.
fn copy(source: &Path, dest: &Path, durable: bool) -> io::Result<u64> {
    let mut src_file = File::open(source)?;
    let mut dest_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dest)?;

    let copied = match stream(&mut src_file, &mut dest_file, durable) {
        Ok(copied) => copied,
        Err(e) => {
            drop(dest_file);
            if let Err(cleanup) = fs::remove_file(dest) {
                warn!(?dest, error = %cleanup, "Failed to remove partial copy");
            }
            return Err(e);
        }
    };

    // Preserve modification time
    if let Ok(metadata) = src_file.metadata()
        && let Ok(mtime) = metadata.modified()
    {
        let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
    }

    Ok(copied)
}

/// Stream bytes through a fixed-size buffer
fn stream(source: &mut File, dest: &mut File, durable: bool) -> io::Result<u64> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let bytes_read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        dest.write_all(&buffer[..bytes_read])?;
        copied += bytes_read as u64;
    }

    dest.flush()?;
    if durable {
        dest.sync_all()?;
    }
    Ok(copied)
}
