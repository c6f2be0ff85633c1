//! # s-unzip: Read-only ZIP Access with Chunked Inflate
//!
//! `s-unzip` opens a ZIP archive from a borrowed file descriptor or a raw
//! byte path, parses its central directory once, and decompresses entries
//! either into a single buffer or as a lazy sequence of bounded chunks.
//!
//! ## Features
//!
//! - **Descriptor or path**: borrow a caller's open file, or open by path bytes
//! - **Tolerant directory scan**: archive comments and prefix stubs (self-extractors) are handled
//! - **Chunked inflate**: decompress in caller-sized chunks without re-decoding
//! - **Byte-exact names**: entries are looked up by raw name bytes, no decoding
//! - **Shareable**: one archive can serve concurrent reads of different entries
//!
//! ## Quick Start
//!
//! ### Reading a whole entry
//!
//! ```no_run
//! use s_unzip::ZipArchive;
//! use std::fs::File;
//!
//! let file = File::open("archive.zip")?;
//! let archive = ZipArchive::open(&file)?;
//!
//! let stat = archive.stat(b"sample.txt")?;
//! println!("{} bytes", stat.uncompressed_size);
//!
//! let data = archive.read_all(b"sample.txt")?;
//! assert_eq!(data.len() as u64, stat.uncompressed_size);
//! # Ok::<(), s_unzip::UnzipError>(())
//! ```
//!
//! ### Reading in chunks
//!
//! ```no_run
//! use s_unzip::ZipArchive;
//!
//! let archive = ZipArchive::open(&b"archive.zip"[..])?;
//! let mut total = 0;
//! for chunk in archive.read_iter(b"big.bin", 1024 * 1024)? {
//!     total += chunk?.len();
//! }
//! println!("read {} bytes", total);
//! # Ok::<(), s_unzip::UnzipError>(())
//! ```

pub mod config;
mod directory;
pub mod entry;
pub mod error;
pub mod inflate;
pub mod reader;
mod session;
pub mod source;
pub mod stream;

pub use config::ReaderConfig;
pub use entry::{CompressionMethod, DosDateTime, EntryStat, ZipEntry};
pub use error::{Result, UnzipError};
pub use inflate::{InflateState, Inflater, Step};
pub use reader::ZipArchive;
pub use source::{ByteSource, Ownership};
pub use stream::{EntryChunks, EntryReader};
