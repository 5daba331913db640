//! Corruption detection: header parse failures on open, checksum scans,
//! and verify-on-read.

use folio::{checksum, Folio, FolioError, Options, CHAPTER_BYTES, PAGE_SIZE};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::TempDir;

/// Helper: flip bytes at an absolute file offset.
fn corrupt_at_offset(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
}

/// Helper: rewrite page 0 through a closure, restamping its checksum so
/// only the intended field is invalid.
fn rewrite_header(path: &Path, mutate: impl FnOnce(&mut [u8])) {
    let mut file = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let mut page = vec![0u8; PAGE_SIZE];
    file.read_exact(&mut page).unwrap();

    mutate(&mut page);
    checksum::stamp(&mut page);

    file.seek(SeekFrom::Start(0)).unwrap();
    file.write_all(&page).unwrap();
    file.flush().unwrap();
}

fn populated_store(path: &Path) -> u32 {
    let store = Folio::open(path, Options::default()).unwrap();
    let handle = store.allocate(100).unwrap();
    store.write(handle, &[1, 2, 3, 4, 5]).unwrap();
    store.close().unwrap();
    handle
}

#[test]
fn test_data_corruption_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.folio");
    let handle = populated_store(&path);

    // Flip one byte inside the head page's data region
    corrupt_at_offset(&path, handle as u64 * PAGE_SIZE as u64 + 100, &[0xFF]);

    let store = Folio::open(&path, Options::default()).unwrap();
    assert!(!store.validate_crc().unwrap());
    store.close().unwrap();
}

#[test]
fn test_verify_on_read_rejects_corrupt_page() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("verify.folio");
    let handle = populated_store(&path);

    corrupt_at_offset(&path, handle as u64 * PAGE_SIZE as u64 + 100, &[0xFF]);

    let store = Folio::open(&path, Options::new().verify_on_read(true)).unwrap();
    assert!(matches!(
        store.read_all(handle),
        Err(FolioError::CorruptData(_))
    ));
    store.close().unwrap();
}

#[test]
fn test_free_page_corruption_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("freepage.folio");
    populated_store(&path);

    // Corrupt a page deep in the untouched free region
    corrupt_at_offset(&path, 3000 * PAGE_SIZE as u64 + 2000, &[0xAB]);

    let store = Folio::open(&path, Options::default()).unwrap();
    assert!(!store.validate_crc().unwrap());
    store.close().unwrap();
}

#[test]
fn test_bad_magic_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("magic.folio");
    populated_store(&path);

    rewrite_header(&path, |page| page[..4].copy_from_slice(b"OOPS"));

    assert!(matches!(
        Folio::open(&path, Options::default()),
        Err(FolioError::CorruptData(_))
    ));
}

#[test]
fn test_future_version_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("version.folio");
    populated_store(&path);

    rewrite_header(&path, |page| page[50..52].copy_from_slice(&2u16.to_le_bytes()));

    assert!(matches!(
        Folio::open(&path, Options::default()),
        Err(FolioError::UnsupportedVersion(2))
    ));
}

#[test]
fn test_header_crc_corruption_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("headercrc.folio");
    populated_store(&path);

    // Raw flip without restamping leaves the header checksum stale
    corrupt_at_offset(&path, 60, &[0x99]);

    assert!(matches!(
        Folio::open(&path, Options::default()),
        Err(FolioError::CorruptData(_))
    ));
}

#[test]
fn test_truncated_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truncated.folio");
    populated_store(&path);

    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(CHAPTER_BYTES - 2048).unwrap();

    assert!(matches!(
        Folio::open(&path, Options::default()),
        Err(FolioError::CorruptData(_))
    ));
}

#[test]
fn test_short_nonempty_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stub.folio");
    std::fs::write(&path, b"not a folio").unwrap();

    assert!(matches!(
        Folio::open(&path, Options::default()),
        Err(FolioError::CorruptData(_))
    ));
}

#[test]
fn test_clean_store_validates_everywhere() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clean.folio");

    let store = Folio::open(&path, Options::default()).unwrap();
    for i in 0..5u32 {
        let handle = store.allocate(i * 3000).unwrap();
        store
            .write(handle, &vec![i as u8; (i * 3000) as usize])
            .unwrap();
    }
    assert!(store.validate_crc().unwrap());
    store.close().unwrap();

    let store = Folio::open(&path, Options::default()).unwrap();
    assert!(store.validate_crc().unwrap());
    store.close().unwrap();
}
