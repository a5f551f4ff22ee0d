//! Tests for the free data page list
//!
//! These tests verify:
//! - Allocation grows the file when the list is empty
//! - Reclaimed chains are reused head first (FIFO)
//! - Corrupted list state is reported, never repaired

use std::io::Cursor;

use filedb::storage::{page_offset, PageFile, DATA_PER_PAGE};
use filedb::FileDbError;

// =============================================================================
// Helper Functions
// =============================================================================

fn new_file() -> PageFile<Cursor<Vec<u8>>> {
    PageFile::create(Cursor::new(Vec::new()), 8).unwrap()
}

fn write_pages(file: &mut PageFile<Cursor<Vec<u8>>>, pages: usize) -> u32 {
    let data = vec![0x5Au8; pages * DATA_PER_PAGE];
    file.write_chain(&mut data.as_slice()).unwrap().0
}

/// Flush, then hand the raw bytes to `patch` and reload
fn patched(
    mut file: PageFile<Cursor<Vec<u8>>>,
    patch: impl FnOnce(&mut Vec<u8>),
) -> PageFile<Cursor<Vec<u8>>> {
    file.flush(false).unwrap();
    let mut bytes = file.into_inner().into_inner();
    patch(&mut bytes);
    PageFile::load(Cursor::new(bytes), 8).unwrap()
}

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_acquire_grows_file() {
    let mut file = new_file();

    let a = file.acquire_data_page().unwrap();
    let b = file.acquire_data_page().unwrap();

    assert_eq!((a.page_id, b.page_id), (1, 2));
    assert!(a.is_empty);
    assert_eq!(file.header().last_page_id, 2);
    assert!(file.header().dirty);
}

#[test]
fn test_acquire_pops_head() {
    let mut file = new_file();
    let first = write_pages(&mut file, 2);
    file.reclaim_chain(first).unwrap();

    let page = file.acquire_data_page().unwrap();
    assert_eq!(page.page_id, 1);
    assert_eq!(file.free_page_ids().unwrap(), vec![2]);

    let page = file.acquire_data_page().unwrap();
    assert_eq!(page.page_id, 2);
    assert_eq!(file.header().free_data_page_id, None);
    assert_eq!(file.header().last_free_data_page_id, None);

    let page = file.acquire_data_page().unwrap();
    assert_eq!(page.page_id, 3);
}

#[test]
fn test_reclaimed_chains_queue_in_order() {
    let mut file = new_file();
    let a = write_pages(&mut file, 2);
    let b = write_pages(&mut file, 1);

    file.reclaim_chain(b).unwrap();
    file.reclaim_chain(a).unwrap();

    assert_eq!(file.free_page_ids().unwrap(), vec![3, 1, 2]);
}

#[test]
fn test_free_list_survives_reload() {
    let mut file = new_file();
    let a = write_pages(&mut file, 3);
    file.reclaim_chain(a).unwrap();

    let mut file = patched(file, |_| {});

    assert_eq!(file.free_page_ids().unwrap(), vec![1, 2, 3]);
}

// =============================================================================
// Invariant Violation Tests
// =============================================================================

#[test]
fn test_non_empty_head_rejected() {
    let mut file = new_file();
    let a = write_pages(&mut file, 1);
    file.reclaim_chain(a).unwrap();

    let mut file = patched(file, |bytes| {
        // clear the empty flag of page 1
        bytes[page_offset(1) as usize + 5] = 0;
    });

    assert!(matches!(
        file.acquire_data_page(),
        Err(FileDbError::NonEmptyPageExpectedEmpty(1))
    ));
}

#[test]
fn test_tail_mismatch_rejected() {
    let mut file = new_file();
    let a = write_pages(&mut file, 2);
    file.reclaim_chain(a).unwrap();

    let mut file = patched(file, |bytes| {
        // point the header tail at the head page
        bytes[20..24].copy_from_slice(&1u32.to_le_bytes());
    });

    assert!(matches!(
        file.free_page_ids(),
        Err(FileDbError::FreeListInvariantViolation(_))
    ));
    file.acquire_data_page().unwrap();
    assert!(matches!(
        file.acquire_data_page(),
        Err(FileDbError::FreeListInvariantViolation(_))
    ));
}

#[test]
fn test_half_empty_list_rejected() {
    let mut file = new_file();
    let a = write_pages(&mut file, 1);
    let b = write_pages(&mut file, 1);
    file.reclaim_chain(a).unwrap();

    let mut file = patched(file, |bytes| {
        // drop the head but keep the tail
        bytes[16..20].copy_from_slice(&u32::MAX.to_le_bytes());
    });

    assert!(matches!(
        file.reclaim_chain(b),
        Err(FileDbError::FreeListInvariantViolation(_))
    ));
}
