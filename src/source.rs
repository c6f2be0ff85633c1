//! Byte-source adapter
//!
//! Normalizes the two ways an archive can be handed to [`ZipArchive::open`]:
//! a borrowed native file handle (descriptor on Unix, `HANDLE` on Windows) or
//! a filesystem path given as raw bytes. Both resolve once, at open time, into
//! a seekable [`File`].
//!
//! A borrowed handle is duplicated rather than adopted, so the caller's handle
//! stays open after the archive is dropped. The duplicate shares the OS file
//! offset with the original, which is why every archive read repositions the
//! cursor before reading.
//!
//! [`ZipArchive::open`]: crate::ZipArchive::open

use crate::error::{Result, UnzipError};
use std::fs::File;
use std::io::{Seek, SeekFrom};

#[cfg(unix)]
use std::os::fd::{AsFd, BorrowedFd};
#[cfg(windows)]
use std::os::windows::io::{AsHandle, BorrowedHandle};

/// Borrowed native handle type for this platform
#[cfg(unix)]
pub type RawHandle<'a> = BorrowedFd<'a>;
/// Borrowed native handle type for this platform
#[cfg(windows)]
pub type RawHandle<'a> = BorrowedHandle<'a>;

/// Where an archive's bytes come from
#[derive(Debug, Clone)]
pub enum ByteSource<'a> {
    /// A handle owned by the caller; duplicated, never closed by the archive
    #[cfg(any(unix, windows))]
    Descriptor(RawHandle<'a>),
    /// A filesystem path as raw bytes; opened and owned by the archive
    Path(&'a [u8]),
}

/// Whether the archive owns the handle it reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Duplicated from a caller handle; shares its file offset
    Borrowed,
    /// Opened from a path by the archive
    Owned,
}

impl<'a> ByteSource<'a> {
    /// Borrow the descriptor of any object exposing one
    #[cfg(unix)]
    pub fn descriptor<T: AsFd + ?Sized>(handle: &'a T) -> Self {
        ByteSource::Descriptor(handle.as_fd())
    }

    /// Borrow the handle of any object exposing one
    #[cfg(windows)]
    pub fn descriptor<T: AsHandle + ?Sized>(handle: &'a T) -> Self {
        ByteSource::Descriptor(handle.as_handle())
    }

    /// Use a filesystem path given as raw bytes
    pub fn path(path: &'a [u8]) -> Self {
        ByteSource::Path(path)
    }

    /// Resolve into a seekable file plus who owns it
    pub(crate) fn into_file(self) -> Result<(File, Ownership)> {
        let (mut file, ownership) = match self {
            #[cfg(any(unix, windows))]
            ByteSource::Descriptor(handle) => {
                let owned = handle.try_clone_to_owned().map_err(|e| {
                    UnzipError::UnsupportedSource(format!("no usable file descriptor: {}", e))
                })?;
                (File::from(owned), Ownership::Borrowed)
            }
            ByteSource::Path(bytes) => (File::open(path_from_bytes(bytes)?)?, Ownership::Owned),
        };

        let metadata = file.metadata().map_err(|e| {
            UnzipError::UnsupportedSource(format!("cannot stat byte source: {}", e))
        })?;
        if metadata.is_dir() {
            return Err(UnzipError::UnsupportedSource(
                "byte source is a directory".to_string(),
            ));
        }

        // Pipes and sockets fail here
        file.seek(SeekFrom::Current(0)).map_err(|e| {
            UnzipError::UnsupportedSource(format!("byte source is not seekable: {}", e))
        })?;

        Ok((file, ownership))
    }
}

#[cfg(any(unix, windows))]
impl<'a> From<&'a File> for ByteSource<'a> {
    fn from(file: &'a File) -> Self {
        ByteSource::descriptor(file)
    }
}

impl<'a> From<&'a [u8]> for ByteSource<'a> {
    fn from(path: &'a [u8]) -> Self {
        ByteSource::Path(path)
    }
}

fn path_from_bytes(bytes: &[u8]) -> Result<std::path::PathBuf> {
    if bytes.is_empty() {
        return Err(UnzipError::UnsupportedSource("empty path".to_string()));
    }
    if bytes.contains(&0) {
        return Err(UnzipError::UnsupportedSource(
            "path contains a NUL byte".to_string(),
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Ok(std::path::Path::new(std::ffi::OsStr::from_bytes(bytes)).to_path_buf())
    }

    #[cfg(not(unix))]
    {
        let s = std::str::from_utf8(bytes).map_err(|_| {
            UnzipError::UnsupportedSource("path is not valid UTF-8".to_string())
        })?;
        Ok(std::path::PathBuf::from(s))
    }
}
