//! Archive builder shared by the integration tests.
//!
//! Writes local headers, data, central directory and end record the same
//! way a plain single-disk ZIP writer does, with hooks to declare wrong
//! sizes or checksums so corrupt archives can be produced on purpose.

#![allow(dead_code)]

use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;

/// 2024-03-09 10:20:30
pub const DOS_TIME: u16 = (10 << 11) | (20 << 5) | 15;
pub const DOS_DATE: u16 = ((2024 - 1980) << 9) | (3 << 5) | 9;

/// One entry to be written
#[derive(Clone)]
pub struct EntrySpec {
    pub name: Vec<u8>,
    pub method: u16,
    pub flags: u16,
    /// Bytes written into the data region
    pub payload: Vec<u8>,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub comment: Vec<u8>,
    pub external_attributes: u32,
}

impl EntrySpec {
    pub fn stored(name: &[u8], data: &[u8]) -> Self {
        Self {
            name: name.to_vec(),
            method: METHOD_STORED,
            flags: 0,
            payload: data.to_vec(),
            crc32: crc32fast::hash(data),
            compressed_size: data.len() as u64,
            uncompressed_size: data.len() as u64,
            comment: Vec::new(),
            external_attributes: 0o100644 << 16,
        }
    }

    pub fn deflated(name: &[u8], data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let payload = encoder.finish().unwrap();
        Self {
            compressed_size: payload.len() as u64,
            payload,
            method: METHOD_DEFLATE,
            ..Self::stored(name, data)
        }
    }

    /// Arbitrary bytes in the data region
    pub fn raw(name: &[u8], method: u16, payload: &[u8], uncompressed_size: u64) -> Self {
        Self {
            name: name.to_vec(),
            method,
            flags: 0,
            payload: payload.to_vec(),
            crc32: 0,
            compressed_size: payload.len() as u64,
            uncompressed_size,
            comment: Vec::new(),
            external_attributes: 0,
        }
    }

    pub fn with_compressed_size(mut self, size: u64) -> Self {
        self.compressed_size = size;
        self
    }

    pub fn with_uncompressed_size(mut self, size: u64) -> Self {
        self.uncompressed_size = size;
        self
    }

    pub fn with_crc(mut self, crc32: u32) -> Self {
        self.crc32 = crc32;
        self
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_method(mut self, method: u16) -> Self {
        self.method = method;
        self
    }

    pub fn with_comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }
}

/// Builds a complete archive in memory
#[derive(Default)]
pub struct ArchiveBuilder {
    prefix: Vec<u8>,
    entries: Vec<EntrySpec>,
    comment: Vec<u8>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes placed before the archive, as a self-extractor stub would be
    pub fn prefix(mut self, prefix: &[u8]) -> Self {
        self.prefix = prefix.to_vec();
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn entry(mut self, spec: EntrySpec) -> Self {
        self.entries.push(spec);
        self
    }

    pub fn stored(self, name: &[u8], data: &[u8]) -> Self {
        self.entry(EntrySpec::stored(name, data))
    }

    pub fn deflated(self, name: &[u8], data: &[u8]) -> Self {
        self.entry(EntrySpec::deflated(name, data))
    }

    pub fn build(&self) -> Vec<u8> {
        // Offsets are relative to the archive, not to the stub
        let mut out = Vec::new();
        let mut offsets = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            offsets.push(out.len() as u32);
            out.extend_from_slice(&[0x50, 0x4b, 0x03, 0x04]); // local header sig
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&entry.flags.to_le_bytes());
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&DOS_TIME.to_le_bytes());
            out.extend_from_slice(&DOS_DATE.to_le_bytes());
            out.extend_from_slice(&entry.crc32.to_le_bytes());
            out.extend_from_slice(&(entry.compressed_size as u32).to_le_bytes());
            out.extend_from_slice(&(entry.uncompressed_size as u32).to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra len
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&entry.payload);
        }

        let cd_offset = out.len() as u32;
        for (entry, offset) in self.entries.iter().zip(&offsets) {
            out.extend_from_slice(&[0x50, 0x4b, 0x01, 0x02]); // central dir sig
            out.extend_from_slice(&(0x0300u16 | 20).to_le_bytes()); // made by: unix, 2.0
            out.extend_from_slice(&20u16.to_le_bytes()); // version needed
            out.extend_from_slice(&entry.flags.to_le_bytes());
            out.extend_from_slice(&entry.method.to_le_bytes());
            out.extend_from_slice(&DOS_TIME.to_le_bytes());
            out.extend_from_slice(&DOS_DATE.to_le_bytes());
            out.extend_from_slice(&entry.crc32.to_le_bytes());
            out.extend_from_slice(&(entry.compressed_size as u32).to_le_bytes());
            out.extend_from_slice(&(entry.uncompressed_size as u32).to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // extra len
            out.extend_from_slice(&(entry.comment.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // disk start
            out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            out.extend_from_slice(&entry.external_attributes.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&entry.comment);
        }
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(&[0x50, 0x4b, 0x05, 0x06]); // end of central dir sig
        out.extend_from_slice(&0u16.to_le_bytes()); // disk
        out.extend_from_slice(&0u16.to_le_bytes()); // disk with cd
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);

        let mut archive = self.prefix.clone();
        archive.extend_from_slice(&out);
        archive
    }

    /// Write the archive to a named temporary file
    pub fn write_temp(&self) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(&self.build()).unwrap();
        temp.flush().unwrap();
        temp
    }
}

/// Path of a temp file as raw bytes
pub fn path_bytes(temp: &NamedTempFile) -> Vec<u8> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        temp.path().as_os_str().as_bytes().to_vec()
    }
    #[cfg(not(unix))]
    {
        temp.path().to_str().unwrap().as_bytes().to_vec()
    }
}

/// Route library logs to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
