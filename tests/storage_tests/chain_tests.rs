//! Tests for data chains
//!
//! These tests verify:
//! - Chains split payloads into DATA_PER_PAGE blocks
//! - Reads stream the exact bytes back
//! - Reclaimed chains can no longer be read
//! - Cycles and dangling links are reported as corruption

use std::io::{Cursor, Read};

use filedb::storage::{page_offset, PageFile, DATA_PER_PAGE};
use filedb::FileDbError;

// =============================================================================
// Helper Functions
// =============================================================================

fn new_file() -> PageFile<Cursor<Vec<u8>>> {
    PageFile::create(Cursor::new(Vec::new()), 8).unwrap()
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

// =============================================================================
// Write / Read Tests
// =============================================================================

#[test]
fn test_write_and_read_chain() {
    let mut file = new_file();
    let data = payload(2 * DATA_PER_PAGE + 17);

    let (first, written) = file.write_chain(&mut data.as_slice()).unwrap();

    assert_eq!(first, 1);
    assert_eq!(written, data.len() as u64);
    assert_eq!(file.chain_page_ids(first).unwrap(), vec![1, 2, 3]);

    let mut out = Vec::new();
    let read = file.read_chain(first, &mut out).unwrap();
    assert_eq!(read, data.len() as u64);
    assert_eq!(out, data);
}

#[test]
fn test_chain_page_count_boundaries() {
    let mut file = new_file();

    for (len, pages) in [(0, 1), (1, 1), (DATA_PER_PAGE, 1), (DATA_PER_PAGE + 1, 2)] {
        let (first, _) = file.write_chain(&mut payload(len).as_slice()).unwrap();
        assert_eq!(file.chain_page_ids(first).unwrap().len(), pages, "len {}", len);
    }
}

#[test]
fn test_open_chain_reads_in_small_steps() {
    let mut file = new_file();
    let data = payload(DATA_PER_PAGE + 100);
    let (first, _) = file.write_chain(&mut data.as_slice()).unwrap();

    let mut reader = file.open_chain(first).unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 333];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }

    assert_eq!(out, data);
}

#[test]
fn test_chain_pages_are_written_immediately() {
    let mut file = new_file();
    let (first, _) = file.write_chain(&mut payload(10).as_slice()).unwrap();

    let bytes = file.into_inner().into_inner();
    let offset = page_offset(first) as usize;

    assert_eq!(bytes.len(), offset + 4096);
    assert_eq!(bytes[offset], 1);
    assert_eq!(&bytes[offset + 8..offset + 18], payload(10).as_slice());
}

// =============================================================================
// Reclaim Tests
// =============================================================================

#[test]
fn test_reclaimed_chain_is_unreadable() {
    let mut file = new_file();
    let (first, _) = file.write_chain(&mut payload(100).as_slice()).unwrap();

    file.reclaim_chain(first).unwrap();

    let mut out = Vec::new();
    let result = file.read_chain(first, &mut out);
    assert!(matches!(result, Err(FileDbError::Corrupted(_))));
}

#[test]
fn test_reclaim_moves_pages_to_free_list() {
    let mut file = new_file();
    let (first, _) = file.write_chain(&mut payload(3 * DATA_PER_PAGE).as_slice()).unwrap();

    file.reclaim_chain(first).unwrap();

    assert_eq!(file.free_page_ids().unwrap(), vec![1, 2, 3]);
    assert_eq!(file.header().free_data_page_id, Some(1));
    assert_eq!(file.header().last_free_data_page_id, Some(3));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_link_beyond_last_page() {
    let mut file = new_file();

    assert!(matches!(file.open_chain(5), Err(FileDbError::Corrupted(_))));
    assert!(matches!(file.chain_page_ids(5), Err(FileDbError::Corrupted(_))));
}

#[test]
fn test_self_linked_page_detected() {
    let mut file = new_file();
    let (first, _) = file.write_chain(&mut payload(10).as_slice()).unwrap();
    file.flush(false).unwrap();

    let mut bytes = file.into_inner().into_inner();
    let offset = page_offset(first) as usize;
    bytes[offset + 1..offset + 5].copy_from_slice(&first.to_le_bytes());

    let mut file = PageFile::load(Cursor::new(bytes), 8).unwrap();
    assert!(matches!(file.chain_page_ids(first), Err(FileDbError::Corrupted(_))));

    let mut out = Vec::new();
    assert!(matches!(file.read_chain(first, &mut out), Err(FileDbError::Corrupted(_))));
}
