//! Reader configuration
//!
//! Controls how much compressed input a decompression session buffers per
//! refill, how far back from the end of the source the end of central
//! directory record is searched for, and whether CRC-32 is verified.

/// Fixed size of the end of central directory record (without comment)
pub(crate) const EOCD_SIZE: u64 = 22;

/// Largest archive comment the format can express
pub(crate) const MAX_COMMENT_LEN: u64 = u16::MAX as u64;

/// Configuration for opening and reading an archive
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Compressed bytes read from the source per refill (default: 64KB, min: 1KB)
    pub buffer_size: usize,
    /// Bytes scanned backward from the end for the EOCD record (default: 22 + 65535)
    pub scan_window: u64,
    /// Verify CRC-32 once an entry is fully produced (default: true)
    pub verify_crc: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
            scan_window: EOCD_SIZE + MAX_COMMENT_LEN,
            verify_crc: true,
        }
    }
}

impl ReaderConfig {
    /// Small refill buffer for memory constrained callers
    pub fn low_memory() -> Self {
        Self {
            buffer_size: 16 * 1024,
            ..Self::default()
        }
    }

    /// Large refill buffer, fewer reads against the source
    pub fn high_throughput() -> Self {
        Self {
            buffer_size: 1024 * 1024,
            ..Self::default()
        }
    }

    /// Set the refill buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        assert!(size >= 1024, "buffer_size must be at least 1KB");
        self.buffer_size = size;
        self
    }

    /// Set the EOCD scan window
    ///
    /// Values below the fixed record size are raised to it, values above the
    /// largest possible comment are clamped.
    pub fn with_scan_window(mut self, window: u64) -> Self {
        self.scan_window = window.clamp(EOCD_SIZE, EOCD_SIZE + MAX_COMMENT_LEN);
        self
    }

    /// Enable or disable CRC-32 verification
    pub fn with_crc_verification(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }
}
