//! Reopen behavior: an orderly close (or drop) preserves the header and
//! every stream.

use folio::{Folio, Options};
use tempfile::TempDir;

#[test]
fn test_reopen_preserves_streams_and_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("persist.folio");

    let mut retained = Vec::new();
    let (first_free, chapters) = {
        let store = Folio::open(&path, Options::default()).unwrap();
        for i in 0..8u32 {
            let data: Vec<u8> = (0..i * 2000).map(|j| (j % 253) as u8).collect();
            let handle = store.allocate(data.len() as u32).unwrap();
            store.write(handle, &data).unwrap();
            retained.push((handle, data));
        }
        let stats = store.stats().unwrap();
        store.close().unwrap();
        (stats.first_free_page, stats.chapter_count)
    };

    {
        let store = Folio::open(&path, Options::default()).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.first_free_page, first_free);
        assert_eq!(stats.chapter_count, chapters);

        for (handle, data) in &retained {
            assert_eq!(store.length(*handle).unwrap() as usize, data.len());
            assert_eq!(&store.read_all(*handle).unwrap(), data);
        }
        store.close().unwrap();
    }
}

#[test]
fn test_drop_flushes_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dropped.folio");

    let handle;
    {
        let store = Folio::open(&path, Options::default()).unwrap();
        handle = store.allocate(100).unwrap();
        store.write(handle, b"kept across drop").unwrap();
        // No close(): Drop writes the header and flushes best-effort
    }

    let store = Folio::open(&path, Options::default()).unwrap();
    assert_eq!(store.read_all(handle).unwrap(), b"kept across drop");
    store.close().unwrap();
}

#[test]
fn test_reopen_after_free_reuses_pages() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reuse.folio");

    let freed_head;
    {
        let store = Folio::open(&path, Options::default()).unwrap();
        let doomed = store.allocate(5000).unwrap();
        store.write(doomed, &vec![1u8; 5000]).unwrap();
        store.free(doomed).unwrap();
        freed_head = doomed;
        store.close().unwrap();
    }

    {
        let store = Folio::open(&path, Options::default()).unwrap();
        // The freed chain survived on the free-list across reopen
        assert_eq!(store.stats().unwrap().first_free_page, freed_head);
        let handle = store.allocate(0).unwrap();
        assert_eq!(handle, freed_head);
        store.close().unwrap();
    }
}

#[test]
fn test_flush_then_validate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flushed.folio");

    let store = Folio::open(&path, Options::default()).unwrap();
    let handle = store.allocate(12_000).unwrap();
    store.write(handle, &vec![0x42; 12_000]).unwrap();
    store.flush().unwrap();

    assert!(store.validate_crc().unwrap());
    store.close().unwrap();
}

#[test]
fn test_flush_at_write_mode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("durable.folio");

    let store = Folio::open(&path, Options::new().flush_at_write(true)).unwrap();
    let handle = store.allocate(100).unwrap();
    store.write(handle, b"durable").unwrap();
    assert_eq!(store.read_all(handle).unwrap(), b"durable");
    store.close().unwrap();
}

#[test]
fn test_write_through_mode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("writethrough.folio");

    let store = Folio::open(&path, Options::new().use_write_cache(false)).unwrap();
    let handle = store.allocate(100).unwrap();
    store.write(handle, b"no cache").unwrap();
    assert_eq!(store.read_all(handle).unwrap(), b"no cache");
    store.close().unwrap();
}
