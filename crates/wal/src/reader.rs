//! WAL reader.
//!
//! Reconstructs logical records from the framed, possibly-split,
//! possibly-padded byte stream produced by the writer. The reader is
//! single-pass and forward-only; replaying twice means building a new
//! reader over fresh sources.
//!
//! Reads have three outcomes, kept explicit in the API: a record, a
//! clean end of stream, or an error ([`WalError::is_corruption`]
//! distinguishes broken bytes from I/O failures).

use crate::error::{WalError, WalResult};
use crate::record::{FrameHeader, RecordType, PAGE_SIZE, RECORD_HEADER_SIZE};
use std::io::{self, Read};
use tracing::debug;

/// Forward-only reader of logical records from a framed byte stream.
pub struct WalReader<R> {
    reader: R,
    /// Total bytes consumed so far; padding lengths are computed from
    /// this relative to page boundaries, not record boundaries.
    total: u64,
    /// Record produced by `has_next` and not yet handed out.
    pending: Option<Vec<u8>>,
}

impl<R: Read> WalReader<R> {
    /// Wrap a byte stream positioned at the start of a page.
    pub fn new(reader: R) -> Self {
        WalReader {
            reader,
            total: 0,
            pending: None,
        }
    }

    /// Whether another record can be produced. Caches the record for the
    /// following [`next_record`](Self::next_record) call.
    pub fn has_next(&mut self) -> WalResult<bool> {
        if self.pending.is_none() {
            self.pending = self.read_record()?;
        }
        Ok(self.pending.is_some())
    }

    /// Produce the next logical record.
    ///
    /// `Ok(None)` is a clean end of stream; corruption and I/O failures
    /// are errors, never silently treated as end of data.
    pub fn next_record(&mut self) -> WalResult<Option<Vec<u8>>> {
        if let Some(record) = self.pending.take() {
            return Ok(Some(record));
        }
        self.read_record()
    }

    fn read_record(&mut self) -> WalResult<Option<Vec<u8>>> {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        let mut out = Vec::new();

        loop {
            // The writer never starts a frame with less than a header's
            // worth of space before the page boundary; whatever sits
            // there is padding.
            let to_boundary = PAGE_SIZE - (self.total % PAGE_SIZE as u64) as usize;
            if to_boundary < RECORD_HEADER_SIZE {
                self.consume_padding(to_boundary)?;
                continue;
            }

            let n = read_full(&mut self.reader, &mut header)?;
            if n == 0 {
                if out.is_empty() {
                    debug!(total = self.total, "end of wal stream");
                    return Ok(None);
                }
                // Stream ended between the frames of a split record.
                return Err(WalError::InvalidSize {
                    expected: RECORD_HEADER_SIZE,
                    actual: 0,
                });
            }
            if n < RECORD_HEADER_SIZE {
                return Err(WalError::InvalidSize {
                    expected: RECORD_HEADER_SIZE,
                    actual: n,
                });
            }
            self.total += RECORD_HEADER_SIZE as u64;

            let frame = FrameHeader::decode(&header)?;
            if frame.record_type == RecordType::PageTerm {
                // Skip to the next page boundary. The header itself may
                // have landed exactly on it.
                let pad = (PAGE_SIZE - (self.total % PAGE_SIZE as u64) as usize) % PAGE_SIZE;
                self.consume_padding(pad)?;
                continue;
            }

            let len = frame.length as usize;
            let mut payload = vec![0u8; len];
            let n = read_full(&mut self.reader, &mut payload)?;
            if n < len {
                return Err(WalError::InvalidSize {
                    expected: len,
                    actual: n,
                });
            }
            self.total += len as u64;

            let computed = crate::record::checksum(&payload);
            if computed != frame.crc {
                return Err(WalError::ChecksumMismatch {
                    expected: frame.crc,
                    computed,
                });
            }

            out.extend_from_slice(&payload);
            match frame.record_type {
                RecordType::Full | RecordType::Last => return Ok(Some(out)),
                _ => {}
            }
        }
    }

    /// Consume exactly `len` padding bytes, all of which must be zero.
    fn consume_padding(&mut self, len: usize) -> WalResult<()> {
        if len == 0 {
            return Ok(());
        }

        let mut padding = vec![0u8; len];
        let n = read_full(&mut self.reader, &mut padding)?;
        if n < len {
            return Err(WalError::InvalidSize {
                expected: len,
                actual: n,
            });
        }
        if padding.iter().any(|&b| b != 0) {
            return Err(WalError::InvalidPadding);
        }

        self.total += len as u64;
        Ok(())
    }
}

impl<R: Read> Iterator for WalReader<R> {
    type Item = WalResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Read until `buf` is full or the stream ends; returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> WalResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WalError::Io(e)),
        }
    }
    Ok(filled)
}
