//! Error types for s-unzip

use std::io;
use thiserror::Error;

/// Result type for s-unzip operations
pub type Result<T> = std::result::Result<T, UnzipError>;

/// Error types that can occur while reading a ZIP archive
#[derive(Debug, Error)]
pub enum UnzipError {
    /// I/O error from the underlying byte source
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The byte source could not be adapted into a seekable file
    #[error("Unsupported byte source: {0}")]
    UnsupportedSource(String),

    /// No end of central directory record was found
    #[error("Not a ZIP archive: end of central directory record not found")]
    NotAZipArchive,

    /// The central directory (or a header it points at) is inconsistent
    #[error("Corrupt central directory: {0}")]
    CorruptDirectory(String),

    /// No entry with this exact name exists
    #[error("There is no item named {:?} in the archive", String::from_utf8_lossy(.0))]
    EntryNotFound(Vec<u8>),

    /// The DEFLATE stream is malformed or disagrees with the declared size
    #[error("Inflate error: {0}")]
    InflateError(String),

    /// The compressed data ran out before the declared size was produced
    #[error(
        "Truncated entry {:?}: produced {produced} of {expected} bytes",
        String::from_utf8_lossy(.name)
    )]
    TruncatedEntry {
        name: Vec<u8>,
        expected: u64,
        produced: u64,
    },

    /// A caller-supplied parameter is out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Compression method other than stored or deflate
    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// Entry is flagged as encrypted
    #[error("Entry {:?} is encrypted", String::from_utf8_lossy(.0))]
    EncryptedEntry(Vec<u8>),

    /// CRC-32 of the produced data does not match the central directory
    #[error(
        "CRC mismatch for {:?}: expected {expected:#010x}, computed {computed:#010x}",
        String::from_utf8_lossy(.name)
    )]
    ChecksumMismatch {
        name: Vec<u8>,
        expected: u32,
        computed: u32,
    },
}

impl UnzipError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        UnzipError::CorruptDirectory(msg.into())
    }

    pub(crate) fn inflate(msg: impl Into<String>) -> Self {
        UnzipError::InflateError(msg.into())
    }

    /// True for the `EntryNotFound` variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, UnzipError::EntryNotFound(_))
    }
}
