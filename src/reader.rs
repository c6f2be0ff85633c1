//! Read-only ZIP archive
//!
//! The central directory is parsed once, when the archive is opened, into an
//! immutable entry table. Entry data is decompressed on demand, either all at
//! once ([`ZipArchive::read_all`]) or in bounded chunks
//! ([`ZipArchive::read_iter`]). Each read gets its own decompression session.
//!
//! The archive holds one cursor into its source. Every seek+read pair runs
//! under an internal lock, so a `&ZipArchive` can be shared between threads
//! and several entries can be read at the same time. An archive opened from
//! a borrowed descriptor still shares the OS file offset with every other
//! user of that descriptor; serialize those uses externally.

use crate::config::ReaderConfig;
use crate::directory::read_central_directory;
use crate::entry::{EntryStat, ZipEntry};
use crate::error::{Result, UnzipError};
use crate::session::{Session, OUTPUT_STEP};
use crate::source::{ByteSource, Ownership};
use crate::stream::{EntryChunks, EntryReader};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;

/// Up-front allocation cap for `read_all`; the rest grows as data arrives
const READ_ALL_PREALLOC: u64 = 64 * 1024 * 1024;

/// Read-only ZIP archive over any seekable source
pub struct ZipArchive<R = File> {
    source: Mutex<R>,
    entries: Vec<ZipEntry>,
    names: HashMap<Vec<u8>, usize>,
    comment: Vec<u8>,
    archive_offset: u64,
    zip64: bool,
    ownership: Ownership,
    config: ReaderConfig,
}

impl ZipArchive<File> {
    /// Open an archive from a borrowed descriptor or a path given as bytes
    ///
    /// # Example
    /// ```no_run
    /// use s_unzip::ZipArchive;
    ///
    /// let archive = ZipArchive::open(&b"archive.zip"[..])?;
    /// for entry in archive.entries() {
    ///     println!("{}: {} bytes", String::from_utf8_lossy(&entry.name), entry.uncompressed_size);
    /// }
    /// # Ok::<(), s_unzip::UnzipError>(())
    /// ```
    pub fn open<'a>(source: impl Into<ByteSource<'a>>) -> Result<Self> {
        Self::open_with_config(source, ReaderConfig::default())
    }

    /// Open with a custom configuration
    pub fn open_with_config<'a>(
        source: impl Into<ByteSource<'a>>,
        config: ReaderConfig,
    ) -> Result<Self> {
        let (file, ownership) = source.into().into_file()?;
        Self::from_parts(file, config, ownership)
    }

    /// Open an archive by filesystem path
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_parts(file, ReaderConfig::default(), Ownership::Owned)
    }
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Read the central directory of any `Read + Seek` source
    pub fn new(reader: R) -> Result<Self> {
        Self::with_config(reader, ReaderConfig::default())
    }

    /// Like [`ZipArchive::new`] with a custom configuration
    pub fn with_config(reader: R, config: ReaderConfig) -> Result<Self> {
        Self::from_parts(reader, config, Ownership::Owned)
    }

    fn from_parts(mut reader: R, config: ReaderConfig, ownership: Ownership) -> Result<Self> {
        let directory = read_central_directory(&mut reader, &config)?;

        let mut names = HashMap::with_capacity(directory.entries.len());
        for entry in &directory.entries {
            // First occurrence wins for duplicated names
            names.entry(entry.name.clone()).or_insert(entry.index);
        }

        debug!(
            entries = directory.entries.len(),
            archive_offset = directory.archive_offset,
            zip64 = directory.zip64,
            ?ownership,
            "opened archive"
        );

        Ok(ZipArchive {
            source: Mutex::new(reader),
            entries: directory.entries,
            names,
            comment: directory.comment,
            archive_offset: directory.archive_offset,
            zip64: directory.zip64,
            ownership,
            config,
        })
    }

    /// Number of entries in the central directory
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, in central directory order
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Entry at `index` in central directory order
    pub fn entry(&self, index: usize) -> Option<&ZipEntry> {
        self.entries.get(index)
    }

    /// Find an entry by exact name bytes
    pub fn find_entry(&self, name: &[u8]) -> Option<&ZipEntry> {
        self.names.get(name).map(|&index| &self.entries[index])
    }

    /// Like [`find_entry`](Self::find_entry) but fails with `EntryNotFound`
    pub fn entry_by_name(&self, name: &[u8]) -> Result<&ZipEntry> {
        self.find_entry(name)
            .ok_or_else(|| UnzipError::EntryNotFound(name.to_vec()))
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.names.contains_key(name)
    }

    /// Metadata of the named entry; no data is read
    pub fn stat(&self, name: &[u8]) -> Result<EntryStat> {
        Ok(self.entry_by_name(name)?.stat())
    }

    /// Metadata of the entry at `index`
    pub fn stat_at(&self, index: usize) -> Result<EntryStat> {
        Ok(self.entry_at(index)?.stat())
    }

    /// Decompress the named entry into one buffer
    pub fn read_all(&self, name: &[u8]) -> Result<Vec<u8>> {
        let entry = self.entry_by_name(name)?;
        self.read_entry(entry)
    }

    /// Decompress the entry at `index` into one buffer
    pub fn read_all_at(&self, index: usize) -> Result<Vec<u8>> {
        let entry = self.entry_at(index)?;
        self.read_entry(entry)
    }

    /// Decompress `entry` into one buffer
    pub fn read_entry(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        let mut session = Session::start(&self.source, entry, &self.config)?;
        let mut data = Vec::with_capacity(entry.uncompressed_size.min(READ_ALL_PREALLOC) as usize);
        // The step that reaches the declared size (even a zero-length one)
        // also checks stream end and CRC
        while session.read_to_vec(&self.source, &mut data, OUTPUT_STEP)? > 0 {}
        Ok(data)
    }

    /// Lazily decompress the named entry in chunks of at most `max_chunk_size`
    ///
    /// Every chunk except the last is exactly `max_chunk_size` bytes; the
    /// chunks together are exactly the entry's declared size.
    ///
    /// # Example
    /// ```no_run
    /// use s_unzip::ZipArchive;
    ///
    /// let archive = ZipArchive::open_path("archive.zip")?;
    /// for chunk in archive.read_iter(b"large.bin", 1024 * 1024)? {
    ///     let chunk = chunk?;
    ///     println!("{} bytes", chunk.len());
    /// }
    /// # Ok::<(), s_unzip::UnzipError>(())
    /// ```
    pub fn read_iter(&self, name: &[u8], max_chunk_size: usize) -> Result<EntryChunks<'_, R>> {
        let entry = self.entry_by_name(name)?;
        self.iter_entry(entry, max_chunk_size)
    }

    /// Chunked read of the entry at `index`
    pub fn read_iter_at(&self, index: usize, max_chunk_size: usize) -> Result<EntryChunks<'_, R>> {
        let entry = self.entry_at(index)?;
        self.iter_entry(entry, max_chunk_size)
    }

    /// Chunked read of `entry`; `max_chunk_size` must be positive
    pub fn iter_entry(
        &self,
        entry: &ZipEntry,
        max_chunk_size: usize,
    ) -> Result<EntryChunks<'_, R>> {
        check_chunk_size(max_chunk_size)?;
        let session = Session::start(&self.source, entry, &self.config)?;
        Ok(EntryChunks::new(&self.source, session, max_chunk_size))
    }

    /// `std::io::Read` over the named entry's decompressed data
    pub fn entry_reader(&self, name: &[u8]) -> Result<EntryReader<'_, R>> {
        let entry = self.entry_by_name(name)?;
        let session = Session::start(&self.source, entry, &self.config)?;
        Ok(EntryReader::new(&self.source, session))
    }

    /// Archive comment bytes from the end of central directory record
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Bytes that precede the archive in the source (e.g. a stub)
    pub fn archive_offset(&self) -> u64 {
        self.archive_offset
    }

    /// True when the directory was located through Zip64 records
    pub fn is_zip64(&self) -> bool {
        self.zip64
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Give back the underlying source
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    fn entry_at(&self, index: usize) -> Result<&ZipEntry> {
        self.entries.get(index).ok_or_else(|| {
            UnzipError::InvalidArgument(format!(
                "entry index {} out of range for {} entries",
                index,
                self.entries.len()
            ))
        })
    }
}

impl<R> std::fmt::Debug for ZipArchive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchive")
            .field("entries", &self.entries.len())
            .field("archive_offset", &self.archive_offset)
            .field("zip64", &self.zip64)
            .field("ownership", &self.ownership)
            .finish()
    }
}

fn check_chunk_size(max_chunk_size: usize) -> Result<()> {
    if max_chunk_size == 0 {
        return Err(UnzipError::InvalidArgument(
            "max_chunk_size must be a positive integer".to_string(),
        ));
    }
    Ok(())
}
