//! WAL configuration.

use crate::error::{WalError, WalResult};
use crate::record::{DEFAULT_SEGMENT_SIZE, PAGE_SIZE};

/// WAL configuration parameters.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Segment size in bytes (default: 128 MiB).
    ///
    /// Must be a positive exact multiple of the page size. A segment is
    /// rotated once it has no room left for the next record.
    pub segment_size: usize,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

impl WalConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set segment size (builder pattern).
    pub fn with_segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> WalResult<()> {
        if self.segment_size == 0 || self.segment_size % PAGE_SIZE != 0 {
            return Err(WalError::InvalidSegmentSize(self.segment_size));
        }
        Ok(())
    }

    /// Configuration with tiny segments for fast rotation in tests.
    pub fn for_testing() -> Self {
        WalConfig {
            segment_size: PAGE_SIZE * 2,
        }
    }
}
