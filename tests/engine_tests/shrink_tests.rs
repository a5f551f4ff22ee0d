//! Tests for shrink and compaction
//!
//! These tests verify:
//! - Live entries survive with their ids and bytes
//! - Deleted entries and free pages are dropped
//! - The file does not grow
//! - A failed shrink keeps the handle and its unflushed entries
//! - In-memory compaction via compact_into

use std::fs::{self, OpenOptions};
use std::io::{Cursor, Seek, SeekFrom, Write};

use filedb::config::Config;
use filedb::engine::FileDb;
use filedb::storage::page_offset;
use filedb::FileDbError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ seed).collect()
}

fn open_temp(temp_dir: &TempDir) -> FileDb {
    let config = Config::builder()
        .path(temp_dir.path().join("shrink.filedb"))
        .sync_on_flush(false)
        .build();
    FileDb::open(config).unwrap()
}

// =============================================================================
// Shrink Tests
// =============================================================================

#[test]
fn test_shrink_preserves_live_entries() {
    let temp_dir = TempDir::new().unwrap();
    let mut db = open_temp(&temp_dir);

    let entries: Vec<_> = (0..10u8)
        .map(|i| db.store_bytes(&format!("f{}.bin", i), &payload(5000, i)).unwrap())
        .collect();
    for entry in entries.iter().step_by(2) {
        db.delete(entry.id).unwrap();
    }
    assert_eq!(db.header().last_page_id, 20);

    let report = db.shrink().unwrap();

    assert_eq!(report.entries, 5);
    assert_eq!(report.last_page_id_before, 20);
    assert_eq!(report.last_page_id_after, 10);
    assert_eq!(db.header().last_page_id, 10);
    assert!(db.free_pages().unwrap().is_empty());

    for (i, entry) in entries.iter().enumerate() {
        let read = db.read_to_vec(entry.id).unwrap();
        if i % 2 == 0 {
            assert_eq!(read, None);
        } else {
            assert_eq!(read, Some(payload(5000, i as u8)));
            assert_eq!(db.search(entry.id).unwrap().as_ref(), Some(entry));
        }
    }
}

#[test]
fn test_shrink_never_grows_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut db = open_temp(&temp_dir);
    for i in 0..4u8 {
        db.store_bytes(&format!("f{}.bin", i), &payload(100, i)).unwrap();
    }
    db.flush().unwrap();
    let size_before = fs::metadata(db.path()).unwrap().len();

    let report = db.shrink().unwrap();

    assert_eq!(report.last_page_id_after, report.last_page_id_before);
    assert!(fs::metadata(db.path()).unwrap().len() <= size_before);
}

#[test]
fn test_shrink_removes_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut db = open_temp(&temp_dir);
    db.store_bytes("a.txt", b"a").unwrap();
    let path = db.path().to_path_buf();

    db.shrink().unwrap();
    db.close().unwrap();

    assert!(path.exists());
    assert!(!temp_dir.path().join("shrink.filedb.shrink").exists());
}

#[test]
fn test_shrink_empty_database() {
    let temp_dir = TempDir::new().unwrap();
    let mut db = open_temp(&temp_dir);

    let report = db.shrink().unwrap();

    assert_eq!(report.entries, 0);
    assert_eq!(db.header().last_page_id, 0);
    assert!(db.list_files().unwrap().is_empty());
}

#[test]
fn test_shrink_then_store() {
    let temp_dir = TempDir::new().unwrap();
    let mut db = open_temp(&temp_dir);
    let a = db.store_bytes("a.txt", b"a").unwrap();
    let b = db.store_bytes("b.txt", b"b").unwrap();
    db.delete(a.id).unwrap();

    db.shrink().unwrap();
    let c = db.store_bytes("c.txt", b"c").unwrap();
    db.close().unwrap();

    let mut db = open_temp(&temp_dir);
    assert_eq!(db.read_to_vec(b.id).unwrap(), Some(b"b".to_vec()));
    assert_eq!(db.read_to_vec(c.id).unwrap(), Some(b"c".to_vec()));
    assert_eq!(db.list_files().unwrap().len(), 2);
}

#[test]
fn test_shrink_read_only_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let db = open_temp(&temp_dir);
    let path = db.path().to_path_buf();
    db.close().unwrap();

    let mut db = FileDb::open(Config::builder().path(&path).read_only().build()).unwrap();

    assert!(matches!(db.shrink(), Err(FileDbError::ReadOnly)));
}

#[test]
fn test_shrink_failure_keeps_unflushed_entries() {
    let temp_dir = TempDir::new().unwrap();
    let mut db = open_temp(&temp_dir);
    let kept = db.store_bytes("kept.txt", b"kept").unwrap();
    // a directory where the copy would go makes the target unopenable
    fs::create_dir(temp_dir.path().join("shrink.filedb.shrink")).unwrap();

    assert!(db.shrink().is_err());

    // the handle is still usable
    assert_eq!(db.read_to_vec(kept.id).unwrap(), Some(b"kept".to_vec()));

    // and the entry was flushed before the failure
    drop(db.into_backend());
    let mut db = open_temp(&temp_dir);
    assert_eq!(db.read_to_vec(kept.id).unwrap(), Some(b"kept".to_vec()));
    assert_eq!(db.list_files().unwrap().len(), 1);
}

#[test]
fn test_shrink_failure_removes_partial_copy() {
    let temp_dir = TempDir::new().unwrap();
    let mut db = open_temp(&temp_dir);
    let entry = db.store_bytes("a.bin", &payload(100, 1)).unwrap();
    db.flush().unwrap();

    // mark the entry's only data page empty behind the handle's back
    let mut raw = OpenOptions::new().write(true).open(db.path()).unwrap();
    raw.seek(SeekFrom::Start(page_offset(1) + 5)).unwrap();
    raw.write_all(&[1]).unwrap();
    drop(raw);

    assert!(matches!(db.shrink(), Err(FileDbError::Corrupted(_))));

    assert!(!temp_dir.path().join("shrink.filedb.shrink").exists());
    assert!(db.search(entry.id).unwrap().is_some());
    assert_eq!(db.path(), temp_dir.path().join("shrink.filedb"));
}

// =============================================================================
// compact_into Tests
// =============================================================================

#[test]
fn test_compact_into_memory() {
    let mut source = FileDb::from_backend(Cursor::new(Vec::new()), Config::default()).unwrap();
    let keep = source.store_bytes("keep.bin", &payload(9000, 1)).unwrap();
    let dropped = source.store_bytes("drop.bin", &payload(9000, 2)).unwrap();
    source.delete(dropped.id).unwrap();

    let mut compacted = source.compact_into(Cursor::new(Vec::new())).unwrap();

    assert_eq!(compacted.list_files().unwrap(), vec![keep.clone()]);
    assert_eq!(compacted.read_to_vec(keep.id).unwrap(), Some(payload(9000, 1)));
    assert_eq!(compacted.chain_pages(keep.id).unwrap(), Some(vec![1, 2, 3]));
    // source is untouched
    assert_eq!(source.free_pages().unwrap().len(), 3);
}

#[test]
fn test_compact_into_non_empty_target_rejected() {
    let mut other = FileDb::from_backend(Cursor::new(Vec::new()), Config::default()).unwrap();
    other.store_bytes("x.txt", b"x").unwrap();
    other.flush().unwrap();
    let target = other.into_backend();

    let mut source = FileDb::from_backend(Cursor::new(Vec::new()), Config::default()).unwrap();

    assert!(matches!(source.compact_into(target), Err(FileDbError::Config(_))));
}
