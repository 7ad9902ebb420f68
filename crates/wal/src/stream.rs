//! Sequential multi-source byte stream.
//!
//! Replay reads a range of segment files as one logical stream. The
//! [`SeqReader`] concatenates an ordered list of byte sources and
//! crosses source boundaries transparently, so a record split across
//! two segments reads back exactly like one written within a single
//! segment.

use crate::error::WalResult;
use crate::record::PAGE_SIZE;
use crate::segment::list_segments;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// A byte source whose total size is known up front.
///
/// `SeqReader` captures each source's size once at construction to
/// answer `available()`; sizes are expected not to change while the
/// stream is being read.
pub trait SizedRead: Read {
    /// Unread bytes in this source at construction time.
    fn initial_len(&self) -> io::Result<u64>;
}

impl SizedRead for File {
    fn initial_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl SizedRead for BufReader<File> {
    fn initial_len(&self) -> io::Result<u64> {
        Ok(self.get_ref().metadata()?.len())
    }
}

impl<T: AsRef<[u8]>> SizedRead for io::Cursor<T> {
    fn initial_len(&self) -> io::Result<u64> {
        Ok(self.get_ref().as_ref().len() as u64 - self.position())
    }
}

/// Reader over an ordered list of byte sources.
///
/// A single `read` call keeps filling the caller's buffer across source
/// boundaries; it returns fewer bytes than requested only when every
/// source is exhausted. Empty sources anywhere in the list, including a
/// trailing one, are skipped transparently. Dropping the reader closes
/// every underlying source, reached or not.
pub struct SeqReader<S> {
    rest: std::vec::IntoIter<S>,
    current: Option<S>,
    available: u64,
}

impl<S: SizedRead> SeqReader<S> {
    /// Build a reader over `sources`, summing their sizes for
    /// [`available`](Self::available).
    pub fn new(sources: Vec<S>) -> io::Result<Self> {
        let mut available = 0u64;
        for source in &sources {
            available += source.initial_len()?;
        }

        let mut rest = sources.into_iter();
        let current = rest.next();
        Ok(SeqReader {
            rest,
            current,
            available,
        })
    }

    /// Unread bytes remaining across all sources.
    pub fn available(&self) -> u64 {
        self.available
    }
}

impl<S: SizedRead> Read for SeqReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let Some(source) = self.current.as_mut() else {
                break;
            };
            match source.read(&mut buf[filled..]) {
                Ok(0) => self.current = self.rest.next(),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.available = self.available.saturating_sub(filled as u64);
        Ok(filled)
    }
}

/// A contiguous range of segment indices under one directory.
#[derive(Debug, Clone)]
pub struct SegmentRange {
    /// Directory holding the segment files.
    pub dir: PathBuf,
    /// Lowest segment index to include.
    pub from: u64,
    /// Highest segment index to include.
    pub to: u64,
}

impl SegmentRange {
    /// Range covering segments `from..=to` under `dir`.
    pub fn new(dir: impl Into<PathBuf>, from: u64, to: u64) -> Self {
        SegmentRange {
            dir: dir.into(),
            from,
            to,
        }
    }

    /// Range covering every segment under `dir`.
    pub fn all(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, 0, u64::MAX)
    }
}

/// Open the segment files selected by `ranges`, in order, as one
/// buffered logical stream.
pub fn open_segment_ranges(ranges: &[SegmentRange]) -> WalResult<SeqReader<BufReader<File>>> {
    let mut sources = Vec::new();
    for range in ranges {
        for segment in list_segments(&range.dir)? {
            if segment.index < range.from || segment.index > range.to {
                continue;
            }
            let file = File::open(range.dir.join(&segment.name))?;
            sources.push(BufReader::with_capacity(PAGE_SIZE * 4, file));
        }
    }
    Ok(SeqReader::new(sources)?)
}

/// Open every segment under `dir` as one buffered logical stream.
pub fn open_all_segments(dir: &Path) -> WalResult<SeqReader<BufReader<File>>> {
    open_segment_ranges(&[SegmentRange::all(dir)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sources(parts: &[&[u8]]) -> SeqReader<Cursor<Vec<u8>>> {
        SeqReader::new(parts.iter().map(|p| Cursor::new(p.to_vec())).collect()).unwrap()
    }

    #[test]
    fn test_two_source_stitch() {
        let mut seq = sources(&[b"abcdefg", b"hijklm"]);
        assert_eq!(seq.available(), 13);

        let mut buf = [0u8; 20];
        let mut off = 0;

        off += seq.read(&mut buf[..4]).unwrap();
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(off, 4);
        assert_eq!(seq.available(), 9);

        // Crosses the source boundary within one request.
        off += seq.read(&mut buf[off..off + 4]).unwrap();
        assert_eq!(&buf[..8], b"abcdefgh");
        assert_eq!(off, 8);
        assert_eq!(seq.available(), 5);

        off += seq.read(&mut buf[off..off + 4]).unwrap();
        assert_eq!(&buf[..12], b"abcdefghijkl");
        assert_eq!(seq.available(), 1);

        // Final short read drains the last byte; no duplication, no loss.
        off += seq.read(&mut buf[off..off + 4]).unwrap();
        assert_eq!(off, 13);
        assert_eq!(&buf[..13], b"abcdefghijklm");
        assert_eq!(seq.available(), 0);

        assert_eq!(seq.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_empty_sources_are_transparent() {
        let mut seq = sources(&[b"", b"ab", b"", b"cd", b""]);
        assert_eq!(seq.available(), 4);

        let mut buf = [0u8; 8];
        let n = seq.read(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(seq.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_no_sources() {
        let mut seq: SeqReader<Cursor<Vec<u8>>> = SeqReader::new(Vec::new()).unwrap();
        assert_eq!(seq.available(), 0);

        let mut buf = [0u8; 4];
        assert_eq!(seq.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_exact_across_boundary() {
        use std::io::Read as _;

        let mut seq = sources(&[b"abc", b"def"]);
        let mut buf = [0u8; 6];
        seq.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abcdef");
    }
}
