//! Whole-entry reads and stat

mod common;

use common::{init_tracing, ArchiveBuilder, EntrySpec, DOS_DATE, DOS_TIME, METHOD_DEFLATE};
use s_unzip::{CompressionMethod, ReaderConfig, Result, UnzipError, ZipArchive};
use std::io::{Cursor, Read};

fn open(builder: ArchiveBuilder) -> Result<ZipArchive<Cursor<Vec<u8>>>> {
    ZipArchive::new(Cursor::new(builder.build()))
}

#[test]
fn test_read() -> Result<()> {
    // A leading NUL must not truncate anything
    let mut sample = vec![0u8];
    sample.extend(std::iter::repeat(b'P').take(0x100000));

    let temp = ArchiveBuilder::new()
        .deflated(b"sample.txt", &sample)
        .write_temp();
    let file = std::fs::File::open(temp.path())?;
    let archive = ZipArchive::open(&file)?;

    let contents = archive.read_all(b"sample.txt")?;
    assert_eq!(contents.len(), sample.len());
    assert_eq!(contents, sample);

    Ok(())
}

#[test]
fn test_read_stored_and_deflated() -> Result<()> {
    let text = "The quick brown fox jumps over the lazy dog.\n".repeat(500);
    let binary: Vec<u8> = (0..70_000u32).map(|i| (i * 7 % 251) as u8).collect();

    let archive = open(
        ArchiveBuilder::new()
            .stored(b"text.stored", text.as_bytes())
            .deflated(b"text.deflated", text.as_bytes())
            .deflated(b"binary.bin", &binary)
            .stored(b"empty.stored", b"")
            .deflated(b"empty.deflated", b""),
    )?;

    assert_eq!(archive.read_all(b"text.stored")?, text.as_bytes());
    assert_eq!(archive.read_all(b"text.deflated")?, text.as_bytes());
    assert_eq!(archive.read_all(b"binary.bin")?, binary);
    assert!(archive.read_all(b"empty.stored")?.is_empty());
    assert!(archive.read_all(b"empty.deflated")?.is_empty());

    for (index, entry) in archive.entries().iter().enumerate() {
        assert_eq!(
            archive.read_all_at(index)?.len() as u64,
            entry.uncompressed_size
        );
    }

    Ok(())
}

#[test]
fn test_getinfo() -> Result<()> {
    let temp = ArchiveBuilder::new()
        .deflated(b"sample.txt", &[b'P'; 0x10])
        .write_temp();
    let file = std::fs::File::open(temp.path())?;
    let archive = ZipArchive::open(&file)?;

    let stat = archive.stat(b"sample.txt")?;
    assert_eq!(stat.uncompressed_size, 0x10);
    assert_eq!(stat.filename, b"sample.txt");
    assert_eq!(stat.method, 8);
    assert_eq!(stat.crc32, crc32fast::hash(&[b'P'; 0x10]));
    assert_eq!(stat.file_index, 0);
    assert_eq!(stat.local_header_offset, 0);
    assert_eq!(stat.modified.time, DOS_TIME);
    assert_eq!(stat.modified.date, DOS_DATE);
    assert_eq!(stat.modified.date_parts(), (2024, 3, 9));
    assert_eq!(stat.modified.time_parts(), (10, 20, 30));
    assert_eq!(stat.external_attr >> 16, 0o100644);
    assert!(!stat.is_directory);
    assert!(!stat.is_encrypted);

    let err = archive.stat(b"does_not_exist").unwrap_err();
    assert!(matches!(err, UnzipError::EntryNotFound(ref name) if name == b"does_not_exist"));
    assert!(err.to_string().contains("There is no item named"));
    assert!(err.to_string().contains("does_not_exist"));

    Ok(())
}

#[test]
fn test_missing_entry_for_reads() -> Result<()> {
    let archive = open(ArchiveBuilder::new().stored(b"present", b"x"))?;

    let err = archive.read_all(b"absent").unwrap_err();
    assert!(err.to_string().contains("absent"));
    assert!(err.is_not_found());

    let err = archive.read_iter(b"absent", 4).err().unwrap();
    assert!(err.to_string().contains("absent"));
    assert!(err.is_not_found());

    Ok(())
}

#[test]
fn test_names_are_exact_bytes() -> Result<()> {
    // Latin-1 name that is not valid UTF-8
    let latin1 = b"caf\xe9.txt";
    let archive = open(
        ArchiveBuilder::new()
            .stored(b"Readme.TXT", b"upper")
            .stored(latin1, b"latin1"),
    )?;

    assert!(archive.contains(b"Readme.TXT"));
    assert!(!archive.contains(b"readme.txt"));
    assert!(archive.read_all(b"readme.txt").unwrap_err().is_not_found());
    assert!(archive.read_all("café.txt".as_bytes()).unwrap_err().is_not_found());
    assert_eq!(archive.read_all(latin1)?, b"latin1");

    Ok(())
}

#[test]
fn test_duplicate_names_first_wins() -> Result<()> {
    let archive = open(
        ArchiveBuilder::new()
            .stored(b"dup", b"first")
            .stored(b"dup", b"second"),
    )?;
    assert_eq!(archive.entry_count(), 2);
    assert_eq!(archive.read_all(b"dup")?, b"first");
    assert_eq!(archive.read_all_at(1)?, b"second");

    Ok(())
}

#[test]
fn test_entry_reader() -> Result<()> {
    let data = b"streamed through std::io::Read ".repeat(2000);
    let archive = open(ArchiveBuilder::new().deflated(b"s.txt", &data))?;

    let mut reader = archive.entry_reader(b"s.txt")?;
    assert_eq!(reader.remaining(), data.len() as u64);

    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    assert_eq!(out, data);
    assert_eq!(reader.remaining(), 0);

    Ok(())
}

#[test]
fn test_checksum_mismatch() -> Result<()> {
    let spec = EntrySpec::deflated(b"bad.crc", b"payload").with_crc(0xDEADBEEF);
    let archive = open(ArchiveBuilder::new().entry(spec))?;
    let err = archive.read_all(b"bad.crc").unwrap_err();
    assert!(
        matches!(err, UnzipError::ChecksumMismatch { expected: 0xDEADBEEF, .. }),
        "{}",
        err
    );

    let lenient = ZipArchive::with_config(
        archive.into_inner(),
        ReaderConfig::default().with_crc_verification(false),
    )?;
    assert_eq!(lenient.read_all(b"bad.crc")?, b"payload");

    Ok(())
}

#[test]
fn test_truncated_deflate_entry() -> Result<()> {
    let data: Vec<u8> = (0..200_000u32)
        .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
        .collect();
    let spec = EntrySpec::deflated(b"cut.bin", &data);
    let half = spec.compressed_size / 2;
    let archive = open(ArchiveBuilder::new().entry(spec.with_compressed_size(half)))?;

    let err = archive.read_all(b"cut.bin").unwrap_err();
    assert!(
        matches!(err, UnzipError::TruncatedEntry { expected: 200_000, .. }),
        "{}",
        err
    );

    Ok(())
}

#[test]
fn test_truncated_stored_entry() -> Result<()> {
    let spec = EntrySpec::stored(b"short", b"0123456789").with_compressed_size(4);
    let archive = open(ArchiveBuilder::new().entry(spec))?;
    let err = archive.read_all(b"short").unwrap_err();
    assert!(
        matches!(err, UnzipError::TruncatedEntry { produced: 4, expected: 10, .. }),
        "{}",
        err
    );

    Ok(())
}

#[test]
fn test_stream_shorter_than_declared() -> Result<()> {
    let spec = EntrySpec::deflated(b"short", b"only a few bytes").with_uncompressed_size(64);
    let archive = open(ArchiveBuilder::new().entry(spec))?;
    let err = archive.read_all(b"short").unwrap_err();
    assert!(matches!(err, UnzipError::InflateError(_)), "{}", err);

    Ok(())
}

#[test]
fn test_stream_longer_than_declared() -> Result<()> {
    let spec = EntrySpec::deflated(b"long", b"more bytes than declared").with_uncompressed_size(4);
    let archive = open(ArchiveBuilder::new().entry(spec))?;
    let err = archive.read_all(b"long").unwrap_err();
    assert!(matches!(err, UnzipError::InflateError(_)), "{}", err);

    Ok(())
}

#[test]
fn test_malformed_deflate_stream() -> Result<()> {
    let archive = open(
        ArchiveBuilder::new().entry(EntrySpec::raw(b"garbage", METHOD_DEFLATE, &[0xFF; 32], 100)),
    )?;
    let err = archive.read_all(b"garbage").unwrap_err();
    assert!(matches!(err, UnzipError::InflateError(_)), "{}", err);

    Ok(())
}

#[test]
fn test_unsupported_method_and_encryption() -> Result<()> {
    let archive = open(
        ArchiveBuilder::new()
            .entry(EntrySpec::stored(b"bzip2", b"whatever").with_method(12))
            .entry(EntrySpec::stored(b"secret", b"whatever").with_flags(0x0001)),
    )?;

    assert_eq!(
        archive.entry(0).unwrap().compression_method,
        CompressionMethod::Unknown(12)
    );
    assert!(matches!(
        archive.read_all(b"bzip2").unwrap_err(),
        UnzipError::UnsupportedCompression(12)
    ));
    assert!(archive.stat(b"secret")?.is_encrypted);
    assert!(matches!(
        archive.read_all(b"secret").unwrap_err(),
        UnzipError::EncryptedEntry(_)
    ));

    Ok(())
}

#[test]
fn test_bad_local_header() -> Result<()> {
    init_tracing();
    let mut bytes = ArchiveBuilder::new().stored(b"a.txt", b"alpha").build();
    bytes[0] = b'X';
    let archive = ZipArchive::new(Cursor::new(bytes))?;

    // Listing works, reading does not
    assert_eq!(archive.stat(b"a.txt")?.uncompressed_size, 5);
    let err = archive.read_all(b"a.txt").unwrap_err();
    assert!(matches!(err, UnzipError::CorruptDirectory(_)), "{}", err);

    Ok(())
}

#[test]
fn test_small_buffer_config() -> Result<()> {
    let data = b"refilled many times over ".repeat(10_000);
    let bytes = ArchiveBuilder::new().deflated(b"r.txt", &data).build();
    let archive = ZipArchive::with_config(
        Cursor::new(bytes),
        ReaderConfig::default().with_buffer_size(1024),
    )?;
    assert_eq!(archive.read_all(b"r.txt")?, data);

    Ok(())
}
