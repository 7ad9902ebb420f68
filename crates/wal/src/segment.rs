//! Append-only segment files.
//!
//! A segment is one on-disk file holding a sequence of flushed pages.
//! Segments are named by their index, zero-padded to 8 digits
//! (e.g. `00000007`), and a directory's segment indices must be
//! gap-free starting from the lowest present index.

use crate::error::{WalError, WalResult};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Handle to one append-only segment file.
pub struct Segment {
    file: File,
    index: u64,
    path: PathBuf,
}

impl Segment {
    /// Open or create the segment file for `index` under `dir` in append
    /// mode. A pre-existing file is reopened, not truncated, so a resumed
    /// WAL can pick up its on-disk length.
    pub fn create(dir: &Path, index: u64) -> WalResult<Self> {
        let path = dir.join(segment_file_name(index));
        if path.exists() {
            debug!(path = %path.display(), "segment file already exists");
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Segment { file, index, path })
    }

    /// Segment index.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently on disk.
    pub fn length(&self) -> WalResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Append raw bytes to the file.
    pub fn write(&mut self, data: &[u8]) -> WalResult<()> {
        self.file.write_all(data)?;
        Ok(())
    }

    /// Force all written bytes to durable storage without giving up the
    /// handle. [`close`](Self::close) performs the same sync.
    pub fn sync(&self) -> WalResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Sync and release the file handle.
    pub fn close(self) -> WalResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Reference to a segment file found by a directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    /// File name within the directory.
    pub name: String,
    /// Parsed segment index.
    pub index: u64,
}

fn segment_file_name(index: u64) -> String {
    format!("{index:08}")
}

/// List the segment files in `dir`, sorted by index.
///
/// Entries whose names do not parse as an integer are skipped with a
/// warning (checkpoint directories and stray files live alongside
/// segments). A gap in the sorted indices is a fatal naming-invariant
/// error: the WAL never skips a segment index.
pub fn list_segments(dir: &Path) -> WalResult<Vec<SegmentRef>> {
    let mut refs = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let index = match name.parse::<u64>() {
            Ok(index) => index,
            Err(_) => {
                warn!(name = %name, "not a segment file name, skipping");
                continue;
            }
        };
        refs.push(SegmentRef { name, index });
    }

    refs.sort_by_key(|r| r.index);

    let base = refs.first().map(|r| r.index).unwrap_or(0);
    for (pos, r) in refs.iter().enumerate() {
        if r.index - base != pos as u64 {
            return Err(WalError::NonSequentialSegments(r.name.clone()));
        }
    }

    Ok(refs)
}

/// Index the next created segment should use: highest present index + 1,
/// or 0 for an empty directory.
pub fn next_segment_index(dir: &Path) -> WalResult<u64> {
    Ok(list_segments(dir)?
        .last()
        .map(|r| r.index + 1)
        .unwrap_or(0))
}
