//! On-disk record frame format.
//!
//! Segments hold a sequence of fixed-size pages. Each page holds framed
//! record fragments; a logical record is a single `Full` frame or a
//! `First` .. `Middle`* .. `Last` chain reassembled in order.
//!
//! # Frame Layout
//!
//! ```text
//! ┌────────────┬──────────────────┬──────────────┬───────────────────┐
//! │ Type (1)   │ Length (2, BE)   │ CRC32 (4, BE)│ Payload (Length)  │
//! └────────────┴──────────────────┴──────────────┴───────────────────┘
//! ```
//!
//! The checksum covers the payload bytes only. A zero type byte marks a
//! page terminator: the rest of the page is zero padding and the reader
//! skips to the next page boundary.

use crate::error::{WalError, WalResult};
use crc32fast::Hasher;

/// Size of a page in bytes (32 KiB).
pub const PAGE_SIZE: usize = 32 * 1024;

/// Size of a frame header in bytes: type (1) + length (2) + crc32 (4).
pub const RECORD_HEADER_SIZE: usize = 7;

/// Default segment size in bytes (128 MiB). Must be a multiple of [`PAGE_SIZE`].
pub const DEFAULT_SEGMENT_SIZE: usize = 128 * 1024 * 1024;

/// Frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Rest of the page is zero padding; not a record.
    PageTerm = 0,
    /// A complete record in one frame.
    Full = 1,
    /// First fragment of a split record.
    First = 2,
    /// Final fragment of a split record.
    Last = 3,
    /// Interior fragment of a split record.
    Middle = 4,
}

impl RecordType {
    /// Decode a frame type byte. Unknown values are a corruption error.
    pub fn from_u8(b: u8) -> WalResult<Self> {
        match b {
            0 => Ok(RecordType::PageTerm),
            1 => Ok(RecordType::Full),
            2 => Ok(RecordType::First),
            3 => Ok(RecordType::Last),
            4 => Ok(RecordType::Middle),
            other => Err(WalError::InvalidRecordType(other)),
        }
    }

    /// Wire representation of this type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub(crate) record_type: RecordType,
    pub(crate) length: u16,
    pub(crate) crc: u32,
}

impl FrameHeader {
    /// Decode a header from its 7-byte wire form.
    pub(crate) fn decode(bytes: &[u8; RECORD_HEADER_SIZE]) -> WalResult<Self> {
        let record_type = RecordType::from_u8(bytes[0])?;
        let length = u16::from_be_bytes([bytes[1], bytes[2]]);
        let crc = u32::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]);
        Ok(FrameHeader {
            record_type,
            length,
            crc,
        })
    }
}

/// Encode a frame header into `dst` (must be at least 7 bytes).
pub(crate) fn encode_header(dst: &mut [u8], record_type: RecordType, length: u16, crc: u32) {
    dst[0] = record_type.as_u8();
    dst[1..3].copy_from_slice(&length.to_be_bytes());
    dst[3..RECORD_HEADER_SIZE].copy_from_slice(&crc.to_be_bytes());
}

/// Compute the CRC-32 (IEEE) checksum of `data`.
pub(crate) fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        encode_header(&mut buf, RecordType::Middle, 4096, 0xDEADBEEF);

        let header = FrameHeader::decode(&buf).unwrap();
        assert_eq!(header.record_type, RecordType::Middle);
        assert_eq!(header.length, 4096);
        assert_eq!(header.crc, 0xDEADBEEF);
    }

    #[test]
    fn test_type_byte_mapping() {
        for (byte, expected) in [
            (0u8, RecordType::PageTerm),
            (1, RecordType::Full),
            (2, RecordType::First),
            (3, RecordType::Last),
            (4, RecordType::Middle),
        ] {
            assert_eq!(RecordType::from_u8(byte).unwrap(), expected);
            assert_eq!(expected.as_u8(), byte);
        }
    }

    #[test]
    fn test_invalid_type_byte() {
        assert!(matches!(
            RecordType::from_u8(9),
            Err(WalError::InvalidRecordType(9))
        ));
    }

    #[test]
    fn test_checksum_detects_change() {
        let crc = checksum(b"hello");
        assert_ne!(crc, checksum(b"hellp"));
        assert_eq!(crc, checksum(b"hello"));
    }
}
