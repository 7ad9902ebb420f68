//! WAL error taxonomy.
//!
//! Three classes of failure:
//!
//! - corruption: checksum mismatch, non-zero padding, truncated frames;
//!   the bytes on disk are broken
//! - configuration/invariant violations: bad segment size, non-sequential
//!   segment names, checkpoint gaps, double close
//! - I/O errors, propagated unchanged
//!
//! Clean end-of-stream is not an error: the reader reports it as
//! `Ok(None)` / `has_next() == false`.

/// Result alias used throughout the crate.
pub type WalResult<T> = Result<T, WalError>;

/// Errors produced by the WAL.
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    /// Payload checksum did not match the frame header.
    #[error("checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum declared in the frame header.
        expected: u32,
        /// Checksum computed over the payload read from disk.
        computed: u32,
    },

    /// Frame type byte is not a known record type.
    #[error("invalid record type: {0}")]
    InvalidRecordType(u8),

    /// A page padding byte was non-zero.
    #[error("non-zero byte in page padding")]
    InvalidPadding,

    /// Fewer bytes than a frame requires were available mid-stream.
    #[error("truncated frame: expected {expected} bytes, read {actual}")]
    InvalidSize {
        /// Bytes the frame declared.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// Segment file names in a directory are not gap-free.
    #[error("segment name is not sequential: {0}")]
    NonSequentialSegments(String),

    /// Segment size is not a positive multiple of the page size.
    #[error("segment size {0} is not a positive multiple of the page size")]
    InvalidSegmentSize(usize),

    /// Checkpoint range does not start right after the previous checkpoint.
    #[error("checkpoint gap: from={from}, expected {expected}")]
    CheckpointGap {
        /// Requested first segment of the range.
        from: u64,
        /// Previous checkpoint index + 1.
        expected: u64,
    },

    /// A checkpoint-prefixed directory entry is not a directory.
    #[error("checkpoint entry is not a directory: {0}")]
    CheckpointNotDirectory(String),

    /// The WAL was closed twice.
    #[error("wal is already closed")]
    AlreadyClosed,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WalError {
    /// Whether this error means the bytes on disk are broken, as opposed
    /// to a configuration or I/O problem.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            WalError::ChecksumMismatch { .. }
                | WalError::InvalidRecordType(_)
                | WalError::InvalidPadding
                | WalError::InvalidSize { .. }
        )
    }
}
