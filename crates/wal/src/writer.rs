//! WAL writer.
//!
//! The writer appends arbitrary-length records into fixed-size pages,
//! flushes pages into the active segment, and rotates to the next
//! sequential segment when the current one has no room left for a
//! record. Fsync is intentionally not performed per `log` call; batches
//! amortize the cost and only rotation and close force durability
//! (see prometheus/prometheus#5869).

use crate::config::WalConfig;
use crate::error::{WalError, WalResult};
use crate::page::Page;
use crate::record::{RecordType, PAGE_SIZE, RECORD_HEADER_SIZE};
use crate::segment::{list_segments, next_segment_index, Segment};
use std::path::PathBuf;
use tracing::{debug, info};

/// Single-writer append handle over a WAL directory.
///
/// One `Wal` owns the active page and segment exclusively; there is no
/// internal locking, so concurrent `log` calls must be serialized by
/// the caller.
pub struct Wal {
    dir: PathBuf,
    config: WalConfig,
    page: Page,
    /// Active segment; `None` once closed.
    segment: Option<Segment>,
    /// Whole pages already flushed into the active segment.
    done_pages: usize,
    closed: bool,
}

impl Wal {
    /// Open a WAL rooted at `dir`, creating the directory if needed.
    ///
    /// Writing resumes after the highest existing segment: a fresh
    /// segment index is chosen and page accounting picks up the
    /// segment's on-disk length.
    pub fn open(dir: impl Into<PathBuf>, config: WalConfig) -> WalResult<Self> {
        config.validate()?;
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let segment = Segment::create(&dir, next_segment_index(&dir)?)?;
        let mut wal = Wal {
            dir,
            config,
            page: Page::new(),
            segment: None,
            done_pages: 0,
            closed: false,
        };
        wal.set_segment(segment)?;
        Ok(wal)
    }

    /// Append a batch of records.
    ///
    /// Each record may be split into `First`/`Middle`/`Last` frames
    /// across pages and segments. The page is flushed (without being
    /// abandoned) after the final record, so a completed batch is on
    /// its way to disk even though no fsync happens here.
    pub fn log<B: AsRef<[u8]>>(&mut self, records: &[B]) -> WalResult<()> {
        if self.closed {
            return Err(WalError::AlreadyClosed);
        }
        let count = records.len();
        for (i, record) in records.iter().enumerate() {
            self.log_record(record.as_ref(), i + 1 == count)?;
        }
        Ok(())
    }

    fn log_record(&mut self, record: &[u8], last_in_batch: bool) -> WalResult<()> {
        // Free space in the current page plus the whole pages left in
        // the active segment (minus the page currently in use).
        let remaining = self.page.available_space() as i64
            + (PAGE_SIZE - RECORD_HEADER_SIZE) as i64 * (self.remaining_pages() - 1);
        if remaining < (record.len() + RECORD_HEADER_SIZE) as i64 {
            self.rotate_segment()?;
        }

        let mut offset = 0;
        let mut fragment_index = 0;
        loop {
            let remaining_payload = record.len() - offset;
            let available_page_space = self.page.available_space() - RECORD_HEADER_SIZE;
            let len = remaining_payload.min(available_page_space);
            let completes = available_page_space >= remaining_payload;
            let record_type = match (fragment_index == 0, completes) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };

            self.page
                .append_record(record_type, &record[offset..offset + len]);
            offset += len;

            if self.page.full() {
                self.flush_page(true)?;
            }

            fragment_index += 1;
            if offset >= record.len() {
                break;
            }
        }

        if last_in_batch && self.page.allocated() > 0 {
            self.flush_page(false)?;
        }
        Ok(())
    }

    /// Delete every segment with index strictly less than `before_index`.
    ///
    /// Used once a checkpoint has made those segments redundant.
    pub fn truncate(&mut self, before_index: u64) -> WalResult<()> {
        for segment in list_segments(&self.dir)? {
            if segment.index >= before_index {
                continue;
            }
            let path = self.dir.join(&segment.name);
            std::fs::remove_file(&path)?;
            info!(path = %path.display(), "deleted segment");
        }
        Ok(())
    }

    /// Flush outstanding page data, fsync and close the active segment.
    ///
    /// Closing twice is an error.
    pub fn close(&mut self) -> WalResult<()> {
        if self.closed {
            return Err(WalError::AlreadyClosed);
        }

        if self.page.allocated() > 0 {
            self.flush_page(true)?;
        }

        let segment = self.segment.take().ok_or(WalError::AlreadyClosed)?;
        segment.close()?;
        self.closed = true;
        Ok(())
    }

    /// Flush the page's unflushed bytes into the active segment.
    ///
    /// With `clear` (or when the page is full) the page is first filled
    /// so the written bytes run to the page boundary, then reset; the
    /// tail padding is zero because `clear` zeroes the buffer.
    fn flush_page(&mut self, clear: bool) -> WalResult<()> {
        let clear = clear || self.page.full();
        if clear {
            self.page.fill();
        }

        let segment = self.segment.as_mut().ok_or(WalError::AlreadyClosed)?;
        let len = self.page.buffered_data_size();
        debug!(
            segment = segment.index(),
            len,
            allocated = self.page.allocated(),
            "flushing page"
        );
        segment.write(self.page.unflushed())?;
        self.page.mark_flushed(len);

        if clear {
            self.done_pages += 1;
            self.page.clear();
        }
        Ok(())
    }

    /// Finalize the current page, open the next sequential segment and
    /// fsync/close the outgoing one.
    fn rotate_segment(&mut self) -> WalResult<()> {
        if self.page.allocated() > 0 {
            self.flush_page(true)?;
        }

        let prev = self.segment.take().ok_or(WalError::AlreadyClosed)?;
        let next = Segment::create(&self.dir, prev.index() + 1)?;
        debug!(old = prev.index(), new = next.index(), "rotating segment");
        self.set_segment(next)?;

        // Blocking on the writer's call path; could move to a background
        // task, correctness does not depend on it.
        prev.close()?;
        Ok(())
    }

    fn set_segment(&mut self, segment: Segment) -> WalResult<()> {
        let len = segment.length()?;
        self.done_pages = (len / PAGE_SIZE as u64) as usize;
        self.segment = Some(segment);
        Ok(())
    }

    /// Whole pages still unused in the active segment. Negative when an
    /// oversized record has grown the segment past its nominal size.
    fn remaining_pages(&self) -> i64 {
        (self.config.segment_size / PAGE_SIZE) as i64 - self.done_pages as i64
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if !self.closed {
            if self.page.allocated() > 0 {
                let _ = self.flush_page(true);
            }
            if let Some(segment) = self.segment.take() {
                let _ = segment.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MESSAGE: &[u8] =
        b"hello_world_this_is_a_test{instance=i-xxxxxx,tag=111111,staging=test,id=xxxxxxxxxxxxx}";

    /// A batch of MESSAGE records that nearly fills one page.
    fn one_page_batch() -> Vec<Vec<u8>> {
        let per_page = PAGE_SIZE / (MESSAGE.len() + RECORD_HEADER_SIZE);
        vec![MESSAGE.to_vec(); per_page]
    }

    #[test]
    fn test_open_creates_first_segment() {
        let dir = tempdir().unwrap();
        let wal_dir = dir.path().join("wal");

        let mut wal = Wal::open(&wal_dir, WalConfig::for_testing()).unwrap();
        assert!(wal_dir.join("00000000").exists());
        wal.close().unwrap();
    }

    #[test]
    fn test_rotation_creates_sequential_segments() {
        let dir = tempdir().unwrap();
        let config = WalConfig::new().with_segment_size(PAGE_SIZE);

        let mut wal = Wal::open(dir.path(), config).unwrap();
        wal.log(&one_page_batch()).unwrap();

        let names: Vec<String> = list_segments(dir.path())
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["00000000"]);

        wal.log(&one_page_batch()).unwrap();
        let names: Vec<String> = list_segments(dir.path())
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["00000000", "00000001"]);

        wal.close().unwrap();
    }

    #[test]
    fn test_close_pads_to_page_boundary() {
        let dir = tempdir().unwrap();
        let config = WalConfig::new().with_segment_size(PAGE_SIZE * 5);

        let mut wal = Wal::open(dir.path(), config.clone()).unwrap();
        wal.log(&one_page_batch()).unwrap();
        wal.close().unwrap();
        assert_eq!(
            std::fs::metadata(dir.path().join("00000000")).unwrap().len(),
            PAGE_SIZE as u64
        );

        // Reopening picks the next index; two batches span two pages.
        let mut wal = Wal::open(dir.path(), config).unwrap();
        wal.log(&one_page_batch()).unwrap();
        wal.log(&one_page_batch()).unwrap();
        wal.close().unwrap();
        assert_eq!(
            std::fs::metadata(dir.path().join("00000001")).unwrap().len(),
            (PAGE_SIZE * 2) as u64
        );
    }

    #[test]
    fn test_double_close_is_an_error() {
        let dir = tempdir().unwrap();
        let mut wal = Wal::open(dir.path(), WalConfig::for_testing()).unwrap();
        wal.close().unwrap();
        assert!(matches!(wal.close(), Err(WalError::AlreadyClosed)));
    }

    #[test]
    fn test_log_after_close_is_an_error() {
        let dir = tempdir().unwrap();
        let mut wal = Wal::open(dir.path(), WalConfig::for_testing()).unwrap();
        wal.close().unwrap();
        assert!(matches!(
            wal.log(&[MESSAGE.to_vec()]),
            Err(WalError::AlreadyClosed)
        ));
    }

    #[test]
    fn test_truncate_deletes_older_segments() {
        let dir = tempdir().unwrap();
        let config = WalConfig::new().with_segment_size(PAGE_SIZE);

        let mut wal = Wal::open(dir.path(), config).unwrap();
        for _ in 0..4 {
            wal.log(&one_page_batch()).unwrap();
        }
        wal.close().unwrap();

        let last = list_segments(dir.path()).unwrap().last().unwrap().index;
        assert!(last >= 2);

        let mut wal = Wal::open(dir.path(), WalConfig::for_testing()).unwrap();
        wal.truncate(last).unwrap();
        wal.close().unwrap();

        let remaining = list_segments(dir.path()).unwrap();
        assert!(remaining.iter().all(|r| r.index >= last));
    }

    #[test]
    fn test_rejects_invalid_segment_size() {
        let dir = tempdir().unwrap();
        let config = WalConfig::new().with_segment_size(1000);
        assert!(matches!(
            Wal::open(dir.path(), config),
            Err(WalError::InvalidSegmentSize(1000))
        ));
    }
}
