//! Per-read decompression session
//!
//! A [`Session`] is created for every `read_all`, `read_iter` or
//! `entry_reader` call and is never shared. It remembers where the next
//! compressed byte lives in the source, buffers compressed input, owns the
//! [`Inflater`] and tracks how much output has been produced. The source is
//! locked only for each seek+read pair, so sessions over the same archive can
//! be interleaved freely.

use crate::config::ReaderConfig;
use crate::directory::read_local_header;
use crate::entry::{CompressionMethod, ZipEntry};
use crate::error::{Result, UnzipError};
use crate::inflate::Inflater;
use crc32fast::Hasher as Crc32;
use parking_lot::Mutex;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace};

/// Most output appended to a caller's vector per step
pub(crate) const OUTPUT_STEP: usize = 1024 * 1024;

enum Decoder {
    Stored,
    Deflate(Inflater),
}

pub(crate) struct Session {
    name: Vec<u8>,
    decoder: Decoder,
    /// Absolute source position of the next unread compressed byte
    next_input: u64,
    /// Compressed bytes not yet read from the source
    input_remaining: u64,
    input: Vec<u8>,
    input_pos: usize,
    input_len: usize,
    expected_size: u64,
    produced: u64,
    expected_crc: u32,
    crc: Option<Crc32>,
    finished: bool,
}

impl Session {
    /// Validate the entry, skip its local header and prepare to decode
    pub(crate) fn start<R: Read + Seek>(
        source: &Mutex<R>,
        entry: &ZipEntry,
        config: &ReaderConfig,
    ) -> Result<Self> {
        if entry.is_encrypted() {
            return Err(UnzipError::EncryptedEntry(entry.name.clone()));
        }
        let decoder = match entry.compression_method {
            CompressionMethod::Stored => Decoder::Stored,
            CompressionMethod::Deflate => Decoder::Deflate(Inflater::new()),
            CompressionMethod::Unknown(method) => {
                return Err(UnzipError::UnsupportedCompression(method))
            }
        };

        let data_start = {
            let mut reader = source.lock();
            read_local_header(&mut *reader, entry)?
        };

        debug!(
            name = %String::from_utf8_lossy(&entry.name),
            method = entry.compression_method.as_u16(),
            compressed = entry.compressed_size,
            uncompressed = entry.uncompressed_size,
            data_start,
            "starting decompression session"
        );

        let input = match decoder {
            Decoder::Stored => Vec::new(),
            Decoder::Deflate(_) => {
                let capacity = (config.buffer_size as u64).min(entry.compressed_size.max(1));
                vec![0u8; capacity as usize]
            }
        };

        Ok(Self {
            name: entry.name.clone(),
            decoder,
            next_input: data_start,
            input_remaining: entry.compressed_size,
            input,
            input_pos: 0,
            input_len: 0,
            expected_size: entry.uncompressed_size,
            produced: 0,
            expected_crc: entry.crc32,
            crc: config.verify_crc.then(Crc32::new),
            finished: false,
        })
    }

    /// Output bytes still owed before the declared size is reached
    pub(crate) fn remaining(&self) -> u64 {
        self.expected_size - self.produced
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn expected_size(&self) -> u64 {
        self.expected_size
    }

    /// Write up to `buf.len()` bytes of output into `buf`.
    ///
    /// Returns the number written; 0 means the entry is complete. Reaching
    /// the declared size also verifies stream end and CRC before returning,
    /// so a bad entry never yields its last bytes. Any error ends the
    /// session.
    pub(crate) fn read_into<R: Read + Seek>(
        &mut self,
        source: &Mutex<R>,
        buf: &mut [u8],
    ) -> Result<usize> {
        if self.finished {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(self.remaining()) as usize;
        if let Err(e) = self.fill(source, &mut buf[..want]) {
            self.finished = true;
            return Err(e);
        }
        Ok(want)
    }

    /// Append up to `limit` bytes of output to `out`
    pub(crate) fn read_to_vec<R: Read + Seek>(
        &mut self,
        source: &Mutex<R>,
        out: &mut Vec<u8>,
        limit: usize,
    ) -> Result<usize> {
        let want = (limit as u64).min(self.remaining()) as usize;
        let start = out.len();
        out.resize(start + want, 0);
        match self.read_into(source, &mut out[start..]) {
            Ok(n) => {
                out.truncate(start + n);
                Ok(n)
            }
            Err(e) => {
                out.truncate(start);
                Err(e)
            }
        }
    }

    /// Fill `out` completely (callers never ask past the declared size)
    fn fill<R: Read + Seek>(&mut self, source: &Mutex<R>, out: &mut [u8]) -> Result<()> {
        let stored = matches!(self.decoder, Decoder::Stored);
        let mut filled = 0;
        while filled < out.len() {
            filled += if stored {
                self.copy_stored(source, &mut out[filled..])?
            } else {
                self.inflate_into(source, &mut out[filled..])?
            };
        }

        if let Some(crc) = self.crc.as_mut() {
            crc.update(out);
        }
        self.produced += out.len() as u64;

        if self.produced == self.expected_size {
            self.finish(source)?;
        }
        Ok(())
    }

    fn copy_stored<R: Read + Seek>(&mut self, source: &Mutex<R>, out: &mut [u8]) -> Result<usize> {
        let want = (out.len() as u64).min(self.input_remaining) as usize;
        if want == 0 {
            return Err(self.truncated());
        }
        let read = {
            let mut reader = source.lock();
            reader.seek(SeekFrom::Start(self.next_input))?;
            reader.read(&mut out[..want])?
        };
        if read == 0 {
            self.input_remaining = 0;
            return Err(self.truncated());
        }
        self.next_input += read as u64;
        self.input_remaining -= read as u64;
        Ok(read)
    }

    fn inflate_into<R: Read + Seek>(&mut self, source: &Mutex<R>, out: &mut [u8]) -> Result<usize> {
        if self.input_pos == self.input_len && self.input_remaining > 0 {
            self.refill(source)?;
        }

        let Decoder::Deflate(inflater) = &mut self.decoder else {
            unreachable!("inflate_into on a stored entry");
        };
        let step = inflater.step(&self.input[self.input_pos..self.input_len], out)?;
        self.input_pos += step.consumed;

        if step.produced > 0 {
            return Ok(step.produced);
        }
        if inflater.is_done() {
            return Err(UnzipError::inflate(format!(
                "stream ended before the declared size of {} bytes",
                self.expected_size
            )));
        }
        if step.consumed > 0 {
            return Ok(0);
        }
        if self.input_pos == self.input_len && self.input_remaining == 0 {
            return Err(self.truncated());
        }
        Err(UnzipError::inflate("decoder made no progress"))
    }

    fn refill<R: Read + Seek>(&mut self, source: &Mutex<R>) -> Result<()> {
        let want = (self.input.len() as u64).min(self.input_remaining) as usize;
        let read = {
            let mut reader = source.lock();
            reader.seek(SeekFrom::Start(self.next_input))?;
            reader.read(&mut self.input[..want])?
        };
        trace!(offset = self.next_input, read, "refilled compressed input");
        if read == 0 {
            // Source ends inside the compressed region
            self.input_remaining = 0;
        }
        self.next_input += read as u64;
        self.input_remaining -= read as u64;
        self.input_pos = 0;
        self.input_len = read;
        Ok(())
    }

    /// Confirm the stream ends at the declared size and check the CRC
    fn finish<R: Read + Seek>(&mut self, source: &Mutex<R>) -> Result<()> {
        self.confirm_stream_end(source)?;
        self.finished = true;

        if let Some(crc) = self.crc.take() {
            let computed = crc.finalize();
            if computed != self.expected_crc {
                return Err(UnzipError::ChecksumMismatch {
                    name: self.name.clone(),
                    expected: self.expected_crc,
                    computed,
                });
            }
        }
        Ok(())
    }

    fn confirm_stream_end<R: Read + Seek>(&mut self, source: &Mutex<R>) -> Result<()> {
        let mut probe = [0u8; 1];
        while !self.decoder_done() {
            if self.input_pos == self.input_len && self.input_remaining > 0 {
                self.refill(source)?;
            }
            let Decoder::Deflate(inflater) = &mut self.decoder else {
                break;
            };
            let step = inflater.step(&self.input[self.input_pos..self.input_len], &mut probe)?;
            self.input_pos += step.consumed;
            if step.produced > 0 {
                return Err(UnzipError::inflate(format!(
                    "stream continues past the declared size of {} bytes",
                    self.expected_size
                )));
            }
            if step.consumed == 0 && !inflater.is_done() {
                // Every declared byte is out; sizes come from the central
                // directory, so a missing end-of-block marker is tolerated
                trace!(
                    name = %String::from_utf8_lossy(&self.name),
                    "compressed region ended before end-of-stream marker"
                );
                break;
            }
        }
        Ok(())
    }

    fn decoder_done(&self) -> bool {
        match &self.decoder {
            Decoder::Stored => true,
            Decoder::Deflate(inflater) => inflater.is_done(),
        }
    }

    fn truncated(&self) -> UnzipError {
        UnzipError::TruncatedEntry {
            name: self.name.clone(),
            expected: self.expected_size,
            produced: self.produced,
        }
    }
}
