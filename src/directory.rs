//! End of central directory scan and central directory parsing
//!
//! The archive is read from the end: the EOCD record is located by scanning
//! backward over at most [`ReaderConfig::scan_window`] bytes, the optional
//! Zip64 locator/record are consulted when the classic fields hold
//! placeholders, and then exactly `total_entries` central directory records
//! are parsed from a single read of the directory.
//!
//! Offsets inside the archive are relative to its own start. When a stub
//! (self-extractor, launcher script) precedes the archive, the difference
//! between where the directory actually ends and where the EOCD says it
//! should end is added to every offset.

use crate::config::{ReaderConfig, EOCD_SIZE};
use crate::entry::{CompressionMethod, DosDateTime, ZipEntry};
use crate::error::{Result, UnzipError};
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace, warn};

/// ZIP local file header signature
pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;

/// ZIP central directory signature
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;

/// ZIP end of central directory signature
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;

/// ZIP64 end of central directory record signature
const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06064b50;

/// ZIP64 end of central directory locator signature
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x07064b50;

/// Zip64 extended information extra field id
const ZIP64_EXTRA_ID: u16 = 0x0001;

pub(crate) const LOCAL_HEADER_SIZE: u64 = 30;
const CENTRAL_HEADER_SIZE: usize = 46;
const ZIP64_LOCATOR_SIZE: u64 = 20;
const ZIP64_EOCD_SIZE: u64 = 56;

/// Parsed directory, ready to become an archive's entry table
#[derive(Debug)]
pub(crate) struct CentralDirectory {
    pub entries: Vec<ZipEntry>,
    pub comment: Vec<u8>,
    /// Bytes preceding the archive proper
    pub archive_offset: u64,
    pub zip64: bool,
}

/// Fixed part of the EOCD record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EndOfCentralDirectory {
    disk_number: u16,
    disk_with_cd: u16,
    disk_entries: u16,
    total_entries: u16,
    cd_size: u32,
    cd_offset: u32,
    comment_len: u16,
}

impl EndOfCentralDirectory {
    fn parse(buf: &[u8]) -> Self {
        Self {
            disk_number: le_u16(buf, 4),
            disk_with_cd: le_u16(buf, 6),
            disk_entries: le_u16(buf, 8),
            total_entries: le_u16(buf, 10),
            cd_size: le_u32(buf, 12),
            cd_offset: le_u32(buf, 16),
            comment_len: le_u16(buf, 20),
        }
    }

    fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// Where the directory is, after Zip64 resolution
struct DirectoryLocation {
    total_entries: u64,
    cd_size: u64,
    cd_offset: u64,
    /// Absolute position where the directory must end
    cd_end: u64,
    zip64: bool,
}

/// Locate the EOCD record and parse the whole central directory
pub(crate) fn read_central_directory<R: Read + Seek>(
    reader: &mut R,
    config: &ReaderConfig,
) -> Result<CentralDirectory> {
    let source_size = reader.seek(SeekFrom::End(0))?;
    if source_size < EOCD_SIZE {
        return Err(UnzipError::NotAZipArchive);
    }

    let window = config.scan_window.min(source_size);
    let tail_start = source_size - window;
    let mut tail = vec![0u8; window as usize];
    reader.seek(SeekFrom::Start(tail_start))?;
    reader.read_exact(&mut tail)?;

    let eocd_index = find_eocd(&tail).ok_or(UnzipError::NotAZipArchive)?;
    let eocd_pos = tail_start + eocd_index as u64;
    let eocd = EndOfCentralDirectory::parse(&tail[eocd_index..]);
    let comment_start = eocd_index + EOCD_SIZE as usize;
    let comment = tail[comment_start..comment_start + eocd.comment_len as usize].to_vec();

    if eocd.disk_number != 0 || eocd.disk_with_cd != 0 {
        return Err(UnzipError::corrupt(format!(
            "multi-disk archive (disk {} of {})",
            eocd.disk_with_cd, eocd.disk_number
        )));
    }

    // Zip64 end records may be present even when the classic fields hold
    // real values; when they are, they describe the directory.
    let location = match locate_zip64(reader, eocd_pos)? {
        Some(location) => location,
        None if eocd.is_zip64() => {
            return Err(UnzipError::corrupt(
                "ZIP64 placeholders without a ZIP64 end of central directory record",
            ));
        }
        None => {
            if eocd.disk_entries != eocd.total_entries {
                return Err(UnzipError::corrupt(format!(
                    "entry count on disk ({}) differs from total ({})",
                    eocd.disk_entries, eocd.total_entries
                )));
            }
            DirectoryLocation {
                total_entries: eocd.total_entries as u64,
                cd_size: eocd.cd_size as u64,
                cd_offset: eocd.cd_offset as u64,
                cd_end: eocd_pos,
                zip64: false,
            }
        }
    };

    let archive_offset = location
        .cd_end
        .checked_sub(location.cd_size)
        .and_then(|start| start.checked_sub(location.cd_offset))
        .ok_or_else(|| {
            UnzipError::corrupt(format!(
                "directory of {} bytes at offset {} does not fit before its end record at {}",
                location.cd_size, location.cd_offset, location.cd_end
            ))
        })?;
    let cd_start = location.cd_offset + archive_offset;

    if location.total_entries > location.cd_size / CENTRAL_HEADER_SIZE as u64 {
        return Err(UnzipError::corrupt(format!(
            "{} entries cannot fit in a {} byte directory",
            location.total_entries, location.cd_size
        )));
    }

    debug!(
        entries = location.total_entries,
        cd_start,
        cd_size = location.cd_size,
        archive_offset,
        zip64 = location.zip64,
        "located central directory"
    );

    let mut cd = vec![0u8; location.cd_size as usize];
    reader.seek(SeekFrom::Start(cd_start))?;
    reader.read_exact(&mut cd)?;

    let entries = parse_entries(
        &cd,
        location.total_entries,
        cd_start,
        archive_offset,
        source_size,
    )?;

    Ok(CentralDirectory {
        entries,
        comment,
        archive_offset,
        zip64: location.zip64,
    })
}

/// Scan backward for an EOCD signature whose comment length accounts for
/// exactly the bytes that follow it. Candidates that fail the check are
/// signature bytes inside a comment and are skipped.
fn find_eocd(tail: &[u8]) -> Option<usize> {
    let last = tail.len().checked_sub(EOCD_SIZE as usize)?;
    for i in (0..=last).rev() {
        if le_u32(tail, i) != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            continue;
        }
        let comment_len = le_u16(tail, i + 20) as usize;
        let trailing = tail.len() - i - EOCD_SIZE as usize;
        if comment_len == trailing {
            return Some(i);
        }
        trace!(
            candidate = i,
            comment_len,
            trailing,
            "rejected end of central directory candidate"
        );
    }
    None
}

/// Resolve directory placement from the Zip64 locator and record, if the
/// archive carries them
fn locate_zip64<R: Read + Seek>(
    reader: &mut R,
    eocd_pos: u64,
) -> Result<Option<DirectoryLocation>> {
    let Some(locator_pos) = eocd_pos.checked_sub(ZIP64_LOCATOR_SIZE) else {
        return Ok(None);
    };

    let mut locator = [0u8; ZIP64_LOCATOR_SIZE as usize];
    reader.seek(SeekFrom::Start(locator_pos))?;
    reader.read_exact(&mut locator)?;
    if le_u32(&locator, 0) != ZIP64_LOCATOR_SIGNATURE {
        return Ok(None);
    }
    let declared = le_u64(&locator, 8);

    // The record normally sits right before the locator; with a prefix stub
    // the declared offset is short by the stub length.
    let mut record = [0u8; ZIP64_EOCD_SIZE as usize];
    let fallback = locator_pos.checked_sub(ZIP64_EOCD_SIZE);
    let mut record_pos = None;
    for candidate in std::iter::once(declared).chain(fallback) {
        if read_signature_at(reader, candidate, ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE)? {
            record_pos = Some(candidate);
            break;
        }
    }
    let Some(record_pos) = record_pos else {
        trace!(declared, "ZIP64 locator without a matching end record");
        return Ok(None);
    };
    reader.seek(SeekFrom::Start(record_pos))?;
    reader.read_exact(&mut record)?;

    let disk_entries = le_u64(&record, 24);
    let total_entries = le_u64(&record, 32);
    if disk_entries != total_entries {
        return Err(UnzipError::corrupt(format!(
            "ZIP64 entry count on disk ({}) differs from total ({})",
            disk_entries, total_entries
        )));
    }

    Ok(Some(DirectoryLocation {
        total_entries,
        cd_size: le_u64(&record, 40),
        cd_offset: le_u64(&record, 48),
        cd_end: record_pos,
        zip64: true,
    }))
}

fn read_signature_at<R: Read + Seek>(reader: &mut R, pos: u64, signature: u32) -> Result<bool> {
    let mut buf = [0u8; 4];
    reader.seek(SeekFrom::Start(pos))?;
    match reader.read_exact(&mut buf) {
        Ok(()) => Ok(u32::from_le_bytes(buf) == signature),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Parse exactly `total` records out of the directory bytes
fn parse_entries(
    cd: &[u8],
    total: u64,
    cd_start: u64,
    archive_offset: u64,
    source_size: u64,
) -> Result<Vec<ZipEntry>> {
    let mut entries = Vec::with_capacity(total as usize);
    let mut pos = 0usize;

    for index in 0..total as usize {
        if pos + CENTRAL_HEADER_SIZE > cd.len() {
            return Err(UnzipError::corrupt(format!(
                "directory ends after {} of {} records",
                index, total
            )));
        }
        let header = &cd[pos..];
        let signature = le_u32(header, 0);
        if signature != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(UnzipError::corrupt(format!(
                "record {} of {} has signature 0x{:08x}",
                index, total, signature
            )));
        }

        let version_made_by = le_u16(header, 4);
        let version_needed = le_u16(header, 6);
        let flags = le_u16(header, 8);
        let method = le_u16(header, 10);
        let modified = DosDateTime {
            time: le_u16(header, 12),
            date: le_u16(header, 14),
        };
        let crc32 = le_u32(header, 16);
        let compressed_size_32 = le_u32(header, 20);
        let uncompressed_size_32 = le_u32(header, 24);
        let name_len = le_u16(header, 28) as usize;
        let extra_len = le_u16(header, 30) as usize;
        let comment_len = le_u16(header, 32) as usize;
        let internal_attributes = le_u16(header, 36);
        let external_attributes = le_u32(header, 38);
        let offset_32 = le_u32(header, 42);

        let record_len = CENTRAL_HEADER_SIZE + name_len + extra_len + comment_len;
        if pos + record_len > cd.len() {
            return Err(UnzipError::corrupt(format!(
                "record {} runs past the declared directory size",
                index
            )));
        }

        let name_start = pos + CENTRAL_HEADER_SIZE;
        let extra_start = name_start + name_len;
        let comment_start = extra_start + extra_len;
        let name = cd[name_start..extra_start].to_vec();
        let extra = &cd[extra_start..comment_start];
        let comment = cd[comment_start..comment_start + comment_len].to_vec();

        let mut compressed_size = compressed_size_32 as u64;
        let mut uncompressed_size = uncompressed_size_32 as u64;
        let mut offset = offset_32 as u64;
        if compressed_size_32 == 0xFFFFFFFF
            || uncompressed_size_32 == 0xFFFFFFFF
            || offset_32 == 0xFFFFFFFF
        {
            apply_zip64_extra(
                extra,
                &mut uncompressed_size,
                &mut compressed_size,
                &mut offset,
            );
        }

        let local_header_offset = offset
            .checked_add(archive_offset)
            .filter(|o| o.saturating_add(LOCAL_HEADER_SIZE) <= source_size)
            .ok_or_else(|| {
                UnzipError::corrupt(format!(
                    "record {} points at local header offset {} outside the source",
                    index, offset
                ))
            })?;

        entries.push(ZipEntry {
            index,
            name,
            comment,
            compressed_size,
            uncompressed_size,
            compression_method: CompressionMethod::from_u16(method),
            crc32,
            local_header_offset,
            central_header_offset: cd_start + pos as u64,
            version_made_by,
            version_needed,
            flags,
            internal_attributes,
            external_attributes,
            modified,
        });

        pos += record_len;
    }

    if pos < cd.len() {
        trace!(unused = cd.len() - pos, "trailing bytes after last directory record");
    }

    Ok(entries)
}

/// Widen placeholder fields from the Zip64 extended information field.
/// Values appear only for fields that hold a placeholder, in the order
/// uncompressed size, compressed size, local header offset.
fn apply_zip64_extra(extra: &[u8], uncompressed: &mut u64, compressed: &mut u64, offset: &mut u64) {
    let mut i = 0usize;
    while i + 4 <= extra.len() {
        let id = le_u16(extra, i);
        let data_len = le_u16(extra, i + 2) as usize;
        i += 4;
        if i + data_len > extra.len() {
            break;
        }
        if id == ZIP64_EXTRA_ID {
            let field = &extra[i..i + data_len];
            let mut cursor = 0usize;
            for value in [uncompressed, compressed, offset] {
                if *value != 0xFFFFFFFF {
                    continue;
                }
                if cursor + 8 > field.len() {
                    break;
                }
                *value = le_u64(field, cursor);
                cursor += 8;
            }
            return;
        }
        i += data_len;
    }
}

/// Validate the local header of `entry` and return where its data starts.
///
/// Only the name and extra lengths are taken from the local header; sizes
/// always come from the central directory.
pub(crate) fn read_local_header<R: Read + Seek>(reader: &mut R, entry: &ZipEntry) -> Result<u64> {
    let mut header = [0u8; LOCAL_HEADER_SIZE as usize];
    reader.seek(SeekFrom::Start(entry.local_header_offset))?;
    reader.read_exact(&mut header).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => UnzipError::corrupt(format!(
            "local header at {} is cut off",
            entry.local_header_offset
        )),
        _ => e.into(),
    })?;

    if le_u32(&header, 0) != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(UnzipError::corrupt(format!(
            "invalid local file header signature at offset {}",
            entry.local_header_offset
        )));
    }

    let name_len = le_u16(&header, 26) as u64;
    let extra_len = le_u16(&header, 28) as u64;

    if name_len as usize == entry.name.len() {
        let mut local_name = vec![0u8; name_len as usize];
        reader.read_exact(&mut local_name)?;
        if local_name != entry.name {
            warn!(
                central = %String::from_utf8_lossy(&entry.name),
                local = %String::from_utf8_lossy(&local_name),
                "local header name differs from central directory"
            );
        }
    } else {
        warn!(
            name = %String::from_utf8_lossy(&entry.name),
            "local header name length differs from central directory"
        );
    }

    Ok(entry.local_header_offset + LOCAL_HEADER_SIZE + name_len + extra_len)
}

fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
