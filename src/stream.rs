//! Incremental access to entry data
//!
//! [`EntryChunks`] yields an entry as a finite, non-restartable sequence of
//! buffers; [`EntryReader`] exposes the same session through
//! [`std::io::Read`]. Dropping either one abandons the read with no further
//! cleanup.

use crate::error::{Result, UnzipError};
use crate::session::{Session, OUTPUT_STEP};
use parking_lot::Mutex;
use std::io::{self, Read, Seek};
use std::iter::FusedIterator;

/// Lazy chunk sequence returned by [`ZipArchive::read_iter`]
///
/// Each `next` runs one bounded decompression step. All chunks but the last
/// hold exactly `max_chunk_size` bytes. After an error the sequence ends.
///
/// [`ZipArchive::read_iter`]: crate::ZipArchive::read_iter
pub struct EntryChunks<'a, R> {
    source: &'a Mutex<R>,
    session: Session,
    max_chunk_size: usize,
}

impl<'a, R: Read + Seek> EntryChunks<'a, R> {
    pub(crate) fn new(source: &'a Mutex<R>, session: Session, max_chunk_size: usize) -> Self {
        Self {
            source,
            session,
            max_chunk_size,
        }
    }

    /// Declared uncompressed size of the entry
    pub fn total_size(&self) -> u64 {
        self.session.expected_size()
    }

    /// Bytes not yet yielded
    pub fn remaining(&self) -> u64 {
        self.session.remaining()
    }
}

impl<R: Read + Seek> Iterator for EntryChunks<'_, R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.session.is_finished() {
            return None;
        }
        // Grow the chunk as output arrives rather than sizing it up front
        let mut chunk = Vec::new();
        while chunk.len() < self.max_chunk_size {
            let step = (self.max_chunk_size - chunk.len()).min(OUTPUT_STEP);
            match self.session.read_to_vec(self.source, &mut chunk, step) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.session.is_finished() {
            return (0, Some(0));
        }
        let chunks = self.session.remaining().div_ceil(self.max_chunk_size as u64);
        // An error may end the sequence early
        (0, usize::try_from(chunks).ok())
    }
}

impl<R: Read + Seek> FusedIterator for EntryChunks<'_, R> {}

/// `std::io::Read` over one entry's decompressed data
pub struct EntryReader<'a, R> {
    source: &'a Mutex<R>,
    session: Session,
}

impl<'a, R: Read + Seek> EntryReader<'a, R> {
    pub(crate) fn new(source: &'a Mutex<R>, session: Session) -> Self {
        Self { source, session }
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> u64 {
        self.session.remaining()
    }
}

impl<R: Read + Seek> Read for EntryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.session
            .read_into(self.source, buf)
            .map_err(into_io_error)
    }
}

fn into_io_error(err: UnzipError) -> io::Error {
    match err {
        UnzipError::Io(e) => e,
        UnzipError::TruncatedEntry { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}
