//! Tests for the index arena and BST
//!
//! These tests verify:
//! - Insert/search over 128-bit ids
//! - Duplicate rejection (including tombstones)
//! - Arena frontier growth into chained index pages
//! - Index pages reach the backend only on flush

use std::io::Cursor;

use filedb::storage::{IndexNode, NodeAddress, PageFile, NODES_PER_PAGE};
use filedb::FileDbError;
use uuid::Uuid;

// =============================================================================
// Helper Functions
// =============================================================================

fn new_file() -> PageFile<Cursor<Vec<u8>>> {
    PageFile::create(Cursor::new(Vec::new()), 8).unwrap()
}

fn node(id: u128) -> IndexNode {
    IndexNode::new(Uuid::from_u128(id), &format!("n{}", id), "dat")
}

// =============================================================================
// Insert / Search Tests
// =============================================================================

#[test]
fn test_insert_and_search() {
    let mut file = new_file();
    let ids = [50u128, 20, 80, 10, 30, 70, 90];

    let addrs: Vec<_> = ids.iter().map(|&id| file.insert(node(id)).unwrap()).collect();

    for (id, addr) in ids.iter().zip(&addrs) {
        assert_eq!(file.search(Uuid::from_u128(*id)).unwrap(), Some(*addr));
    }
    assert_eq!(file.search(Uuid::from_u128(55)).unwrap(), None);
}

#[test]
fn test_nodes_fill_slots_in_order() {
    let mut file = new_file();

    let first = file.insert(node(5)).unwrap();
    let second = file.insert(node(3)).unwrap();

    assert_eq!(first, NodeAddress::new(0, 1));
    assert_eq!(second, NodeAddress::new(0, 2));
}

#[test]
fn test_links_follow_id_order() {
    let mut file = new_file();
    let mid = file.insert(node(50)).unwrap();
    let low = file.insert(node(10)).unwrap();
    let high = file.insert(node(90)).unwrap();

    // every real id sorts above the nil root
    let root = file.root_address();
    assert_eq!(file.node(root).unwrap().right, Some(mid));

    let mid_node = file.node(mid).unwrap().clone();
    assert_eq!(mid_node.left, Some(low));
    assert_eq!(mid_node.right, Some(high));
}

#[test]
fn test_duplicate_rejected() {
    let mut file = new_file();
    file.insert(node(7)).unwrap();

    let result = file.insert(node(7));

    assert!(matches!(result, Err(FileDbError::DuplicateIdentifier(id)) if id == Uuid::from_u128(7)));
}

#[test]
fn test_tombstoned_duplicate_rejected() {
    let mut file = new_file();
    let addr = file.insert(node(7)).unwrap();
    file.mark_deleted(addr).unwrap();

    assert_eq!(file.search(Uuid::from_u128(7)).unwrap(), Some(addr));
    assert!(matches!(file.insert(node(7)), Err(FileDbError::DuplicateIdentifier(_))));
}

// =============================================================================
// Arena Growth Tests
// =============================================================================

#[test]
fn test_frontier_advances_to_new_page() {
    let mut file = new_file();

    // root occupies slot 0 of page 0
    for id in 1..NODES_PER_PAGE as u128 {
        let addr = file.insert(node(id)).unwrap();
        assert_eq!(addr.page_id, 0);
    }
    let overflow = file.insert(node(1000)).unwrap();

    assert_eq!(overflow, NodeAddress::new(1, 0));
    assert_eq!(file.header().free_index_page_id, 1);
    assert_eq!(file.header().last_page_id, 1);
    assert_eq!(file.index_page_ids().unwrap(), vec![0, 1]);
}

#[test]
fn test_list_nodes_skips_tombstones() {
    let mut file = new_file();
    let a = file.insert(node(1)).unwrap();
    file.insert(node(2)).unwrap();
    file.mark_deleted(a).unwrap();

    let live: Vec<_> = file.list_nodes().unwrap().into_iter().map(|n| n.id).collect();

    assert_eq!(live, vec![Uuid::from_u128(2)]);
    assert_eq!(file.all_nodes().unwrap().len(), 3);
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_index_changes_need_flush() {
    let mut file = new_file();
    file.insert(node(1)).unwrap();
    assert!(file.has_unflushed_changes());

    let unflushed = file.into_inner().into_inner();
    let mut reloaded = PageFile::load(Cursor::new(unflushed), 8).unwrap();
    assert_eq!(reloaded.search(Uuid::from_u128(1)).unwrap(), None);

    let mut file = new_file();
    file.insert(node(1)).unwrap();
    file.flush(false).unwrap();
    assert!(!file.has_unflushed_changes());

    let flushed = file.into_inner().into_inner();
    let mut reloaded = PageFile::load(Cursor::new(flushed), 8).unwrap();
    assert!(reloaded.search(Uuid::from_u128(1)).unwrap().is_some());
}

#[test]
fn test_deep_tree_with_small_cache() {
    let mut file = PageFile::create(Cursor::new(Vec::new()), 2).unwrap();

    // ascending ids make a right spine across several pages
    for id in 1..=200u128 {
        file.insert(node(id)).unwrap();
    }
    assert!(file.cache().len() <= 2);

    for id in 1..=200u128 {
        let addr = file.search(Uuid::from_u128(id)).unwrap().unwrap();
        assert_eq!(file.node(addr).unwrap().id, Uuid::from_u128(id));
    }
}
