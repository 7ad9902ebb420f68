//! Segmented write-ahead log for tinytsdb.
//!
//! Everything an append-only time-series store needs to make incoming
//! records durable and replay them in order, exactly once:
//!
//! - Record framing with CRC-32 checksums, split across fixed-size
//!   pages inside rotating fixed-size segment files
//! - Sequential replay across segment (and checkpoint) boundaries
//! - Checkpoint compaction installed by atomic rename
//!
//! Single-writer, single-reader-at-a-time semantics: one [`Wal`] owns
//! its directory for writing, and readers are forward-only and
//! non-restartable. Concurrent writers must be serialized externally.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint; // checkpoint compaction, listing and pruning
pub mod config; // WalConfig
pub mod error; // WalError taxonomy
mod page; // in-memory page buffer (writer internal)
pub mod reader; // logical-record replay
pub mod record; // on-disk frame format and constants
pub mod segment; // segment files and directory scanning
pub mod stream; // multi-segment sequential byte stream
pub mod writer; // the Wal append handle

pub use checkpoint::{
    delete_checkpoint, last_checkpoint, list_checkpoints, perform_checkpoint, CheckpointRef,
};
pub use config::WalConfig;
pub use error::{WalError, WalResult};
pub use reader::WalReader;
pub use record::{RecordType, DEFAULT_SEGMENT_SIZE, PAGE_SIZE, RECORD_HEADER_SIZE};
pub use segment::{list_segments, next_segment_index, Segment, SegmentRef};
pub use stream::{open_all_segments, open_segment_ranges, SegmentRange, SeqReader, SizedRead};
pub use writer::Wal;
