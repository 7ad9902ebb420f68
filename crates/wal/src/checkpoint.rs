//! Checkpoint compaction.
//!
//! A checkpoint is a self-contained WAL directory named
//! `checkpoint.<8-digit index>` holding the compacted state of every
//! segment up to and including that index. It is built under a
//! temporary name and installed with a single atomic rename, so a crash
//! mid-build never leaves a partial checkpoint visible under its final
//! name.

use crate::config::WalConfig;
use crate::error::{WalError, WalResult};
use crate::reader::WalReader;
use crate::stream::{open_segment_ranges, SegmentRange};
use crate::writer::Wal;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CHECKPOINT_PREFIX: &str = "checkpoint.";

/// Reference to a checkpoint directory found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRef {
    /// Directory name within the WAL directory.
    pub name: String,
    /// Highest segment index the checkpoint covers.
    pub index: u64,
}

/// Compact segments `from..=to` (plus the previous checkpoint) into a
/// new checkpoint under `dir`, retaining records for which `keep`
/// returns true.
///
/// Requires a previous checkpoint whose index + 1 equals `from`; a
/// mismatch is fatal so no segment range can be skipped between
/// checkpoints. Without any previous checkpoint this is a no-op.
/// The new checkpoint WAL is fully written and fsynced under a
/// temporary name before the atomic rename that commits it.
pub fn perform_checkpoint(
    dir: &Path,
    from: u64,
    to: u64,
    mut keep: impl FnMut(&[u8]) -> bool,
) -> WalResult<()> {
    info!(from, to, "creating checkpoint");

    let last = match last_checkpoint(dir)? {
        Some(last) => last,
        None => return Ok(()),
    };
    let expected = last.index + 1;
    if from != expected {
        return Err(WalError::CheckpointGap { from, expected });
    }

    let ranges = [
        SegmentRange::all(dir.join(&last.name)),
        SegmentRange::new(dir, from, to),
    ];
    let mut reader = WalReader::new(open_segment_ranges(&ranges)?);

    let final_dir = checkpoint_dir(dir, to);
    let tmp_dir = tmp_checkpoint_dir(&final_dir);
    if tmp_dir.exists() {
        // Leftover from a crashed build; never partially reused.
        warn!(path = %tmp_dir.display(), "removing stale checkpoint build dir");
        std::fs::remove_dir_all(&tmp_dir)?;
    }

    let mut wal = Wal::open(&tmp_dir, WalConfig::default())?;
    let mut retained: Vec<Vec<u8>> = Vec::new();
    while let Some(record) = reader.next_record()? {
        if keep(&record) {
            retained.push(record);
        }
    }
    wal.log(&retained)?;
    wal.close()?;

    // Make the directory entries durable before the commit point.
    File::open(&tmp_dir)?.sync_all()?;
    std::fs::rename(&tmp_dir, &final_dir)?;
    info!(path = %final_dir.display(), records = retained.len(), "checkpoint installed");
    Ok(())
}

/// Delete every checkpoint with index strictly less than `index`.
pub fn delete_checkpoint(dir: &Path, index: u64) -> WalResult<()> {
    for checkpoint in list_checkpoints(dir)? {
        if checkpoint.index >= index {
            continue;
        }
        let path = dir.join(&checkpoint.name);
        std::fs::remove_dir_all(&path)?;
        debug!(path = %path.display(), "deleted checkpoint dir");
    }
    Ok(())
}

/// The newest checkpoint under `dir`, if any.
pub fn last_checkpoint(dir: &Path) -> WalResult<Option<CheckpointRef>> {
    Ok(list_checkpoints(dir)?.pop())
}

/// List checkpoint directories under `dir`, sorted by index.
///
/// Entries with the checkpoint prefix but an unparsable index are
/// skipped with a warning (this covers in-progress `.tmp` builds); a
/// checkpoint-prefixed entry that is not a directory is a configuration
/// error.
pub fn list_checkpoints(dir: &Path) -> WalResult<Vec<CheckpointRef>> {
    let mut refs = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(suffix) = name.strip_prefix(CHECKPOINT_PREFIX) else {
            continue;
        };

        if !entry.file_type()?.is_dir() {
            return Err(WalError::CheckpointNotDirectory(name));
        }

        let index = match suffix.parse::<u64>() {
            Ok(index) => index,
            Err(_) => {
                warn!(name = %name, "not a checkpoint dir name, skipping");
                continue;
            }
        };
        refs.push(CheckpointRef { name, index });
    }

    refs.sort_by_key(|r| r.index);
    Ok(refs)
}

fn checkpoint_dir(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{CHECKPOINT_PREFIX}{index:08}"))
}

fn tmp_checkpoint_dir(final_dir: &Path) -> PathBuf {
    let mut name = final_dir.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
