//! Entry metadata as parsed from the central directory

/// General purpose flag bit: entry is encrypted
const FLAG_ENCRYPTED: u16 = 0x0001;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression (stored)
    Stored,
    /// DEFLATE compression (most common)
    Deflate,
    /// Anything else; listed but not readable
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Modification timestamp in MS-DOS encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// (year, month, day)
    pub fn date_parts(&self) -> (u16, u8, u8) {
        let day = (self.date & 0x1F) as u8;
        let month = ((self.date >> 5) & 0x0F) as u8;
        let year = ((self.date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// (hour, minute, second); seconds have two-second resolution
    pub fn time_parts(&self) -> (u8, u8, u8) {
        let second = ((self.time & 0x1F) * 2) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// One record of the central directory
///
/// Names are raw bytes; no encoding is assumed and lookups compare bytes
/// exactly. Sizes and offsets are already widened from Zip64 extra fields
/// where present, and `local_header_offset` is absolute in the source
/// (any prefix bytes before the archive have been accounted for).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub index: usize,
    pub name: Vec<u8>,
    pub comment: Vec<u8>,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub local_header_offset: u64,
    pub central_header_offset: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub modified: DosDateTime,
}

impl ZipEntry {
    /// Directory entries end with '/'
    pub fn is_directory(&self) -> bool {
        self.name.last() == Some(&b'/')
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Snapshot of every metadata field, without touching entry data
    pub fn stat(&self) -> EntryStat {
        EntryStat {
            file_index: self.index,
            central_dir_offset: self.central_header_offset,
            version_made_by: self.version_made_by,
            version_needed: self.version_needed,
            bit_flag: self.flags,
            method: self.compression_method.as_u16(),
            modified: self.modified,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            internal_attr: self.internal_attributes,
            external_attr: self.external_attributes,
            local_header_offset: self.local_header_offset,
            filename: self.name.clone(),
            comment: self.comment.clone(),
            is_directory: self.is_directory(),
            is_encrypted: self.is_encrypted(),
        }
    }
}

/// Stat record returned by [`ZipArchive::stat`](crate::ZipArchive::stat)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    pub file_index: usize,
    pub central_dir_offset: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub bit_flag: u16,
    pub method: u16,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub internal_attr: u16,
    pub external_attr: u32,
    pub local_header_offset: u64,
    pub filename: Vec<u8>,
    pub comment: Vec<u8>,
    pub is_directory: bool,
    pub is_encrypted: bool,
}
