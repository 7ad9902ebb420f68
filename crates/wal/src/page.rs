//! In-memory page buffer.
//!
//! A page is a fixed-size staging buffer that accumulates framed record
//! fragments before they are written out to the active segment.

use crate::record::{checksum, encode_header, RecordType, PAGE_SIZE, RECORD_HEADER_SIZE};

/// Fixed-size staging buffer for framed records.
///
/// Invariant: `0 <= flushed <= allocated <= PAGE_SIZE`.
pub(crate) struct Page {
    buf: Vec<u8>,
    /// Bytes written into the buffer so far.
    allocated: usize,
    /// Bytes already handed to the segment.
    flushed: usize,
}

impl Page {
    pub(crate) fn new() -> Self {
        Page {
            buf: vec![0u8; PAGE_SIZE],
            allocated: 0,
            flushed: 0,
        }
    }

    /// Bytes still unused in this page.
    pub(crate) fn available_space(&self) -> usize {
        PAGE_SIZE - self.allocated
    }

    /// A page is full once it cannot hold even a bare frame header.
    pub(crate) fn full(&self) -> bool {
        self.available_space() < RECORD_HEADER_SIZE
    }

    /// Bytes written into the buffer but not yet flushed to the segment.
    pub(crate) fn buffered_data_size(&self) -> usize {
        self.allocated - self.flushed
    }

    pub(crate) fn allocated(&self) -> usize {
        self.allocated
    }

    /// Frame `fragment` into the buffer at the current allocation point.
    ///
    /// Writes the 7-byte header followed by the payload and advances
    /// `allocated`. The caller must have checked there is room for the
    /// header plus the fragment. Returns the payload length.
    pub(crate) fn append_record(&mut self, record_type: RecordType, fragment: &[u8]) -> usize {
        let len = fragment.len();
        debug_assert!(len <= u16::MAX as usize);
        debug_assert!(len + RECORD_HEADER_SIZE <= self.available_space());

        let start = self.allocated;
        let crc = checksum(fragment);
        encode_header(&mut self.buf[start..], record_type, len as u16, crc);
        self.buf[start + RECORD_HEADER_SIZE..start + RECORD_HEADER_SIZE + len]
            .copy_from_slice(fragment);

        self.allocated += len + RECORD_HEADER_SIZE;
        len
    }

    /// Mark the whole page as allocated.
    ///
    /// Used when abandoning a page early (rotation, close) so the flush
    /// path emits the rest of the page; the unwritten tail is zero
    /// because `clear` zeroes the buffer.
    pub(crate) fn fill(&mut self) {
        self.allocated = PAGE_SIZE;
    }

    /// The bytes written but not yet flushed.
    pub(crate) fn unflushed(&self) -> &[u8] {
        &self.buf[self.flushed..self.allocated]
    }

    /// Record that `len` bytes from `unflushed` were written out.
    pub(crate) fn mark_flushed(&mut self, len: usize) {
        debug_assert!(self.flushed + len <= self.allocated);
        self.flushed += len;
    }

    /// Reset the page for reuse, zeroing the buffer.
    pub(crate) fn clear(&mut self) {
        self.flushed = 0;
        self.allocated = 0;
        self.buf.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_page() {
        let page = Page::new();
        assert_eq!(page.available_space(), PAGE_SIZE);
        assert_eq!(page.buffered_data_size(), 0);
        assert!(!page.full());
    }

    #[test]
    fn test_append_advances_allocated() {
        let mut page = Page::new();
        let written = page.append_record(RecordType::Full, b"hello");

        assert_eq!(written, 5);
        assert_eq!(page.allocated(), 5 + RECORD_HEADER_SIZE);
        assert_eq!(page.available_space(), PAGE_SIZE - 5 - RECORD_HEADER_SIZE);
        assert_eq!(page.buffered_data_size(), 5 + RECORD_HEADER_SIZE);
    }

    #[test]
    fn test_flush_accounting() {
        let mut page = Page::new();
        page.append_record(RecordType::Full, b"abc");

        let len = page.unflushed().len();
        page.mark_flushed(len);
        assert_eq!(page.buffered_data_size(), 0);

        page.append_record(RecordType::Full, b"defg");
        assert_eq!(page.buffered_data_size(), 4 + RECORD_HEADER_SIZE);
    }

    #[test]
    fn test_fill_exposes_zero_padding() {
        let mut page = Page::new();
        page.append_record(RecordType::Full, b"xy");
        let allocated = page.allocated();

        page.fill();
        assert_eq!(page.allocated(), PAGE_SIZE);

        // Everything beyond the framed data is zero.
        let tail = &page.unflushed()[allocated..];
        assert!(tail.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_clear_resets_and_zeroes() {
        let mut page = Page::new();
        page.append_record(RecordType::Full, b"some data");
        page.fill();
        page.clear();

        assert_eq!(page.allocated(), 0);
        assert_eq!(page.buffered_data_size(), 0);
        assert_eq!(page.available_space(), PAGE_SIZE);

        page.fill();
        assert!(page.unflushed().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_full_when_no_room_for_header() {
        let mut page = Page::new();
        // Leave 3 bytes of space: PAGE_SIZE - (payload + header) = 3.
        let payload = vec![7u8; PAGE_SIZE - RECORD_HEADER_SIZE - 3];
        page.append_record(RecordType::Full, &payload);

        assert_eq!(page.available_space(), 3);
        assert!(page.full());
    }
}
