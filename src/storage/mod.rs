//! Storage Module
//!
//! Paged single-file storage: header, index arena, data chains and free list.
//!
//! ## Responsibilities
//! - Encode/decode the fixed-size header and pages
//! - Map 128-bit identifiers to data chains through an unbalanced BST
//! - Allocate and reclaim data pages through a FIFO free list
//! - Cache index pages in memory with dirty tracking
//!
//! ## File Format (V1)
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ Header (100 bytes)                                         │
//! │   Tag "FileDB" (6) | Version u16 (2) | IndexRoot u32 (4)   │
//! │   FreeIndex u32 (4) | FreeData u32 (4) | LastFreeData (4)  │
//! │   LastPage u32 (4) | padding (74)                          │
//! ├────────────────────────────────────────────────────────────┤
//! │ Page 0 (4096 bytes, always the index root)                 │
//! ├────────────────────────────────────────────────────────────┤
//! │ Page 1 ... Page N (index or data, 4096 bytes each)         │
//! └────────────────────────────────────────────────────────────┘
//!
//! Index page:
//!   Type=2 (1) | Next u32 (4) | NodeCount-1 (1) | reserved (40)
//!   50 × Node (81): Id (16) | Deleted (1) | Right slot+page (1+4)
//!                   Left slot+page (1+4) | DataPage (4)
//!                   Name (41) | Extension (5) | Length (4)
//!
//! Data page:
//!   Type=1 (1) | Next u32 (4) | Empty (1) | DataLength u16 (2)
//!   Payload (4088)
//! ```
//!
//! All integers are little-endian. A "none" page link is `u32::MAX` on disk
//! and `None` in memory.

mod cache;
mod chain;
mod free_list;
mod header;
mod index;
mod page;
mod page_file;
mod pager;

pub use cache::IndexCache;
pub use chain::ChainReader;
pub use header::Header;
pub use page::{DataPage, IndexNode, IndexPage, NodeAddress, PageType};
pub use page_file::PageFile;
pub use pager::{Backend, Pager};

/// Page identifier (dense, 0-based)
pub type PageId = u32;

// =============================================================================
// Layout Constants
// =============================================================================

/// Size of the file header preceding page 0
pub const HEADER_SIZE: usize = 100;

/// Size of every page
pub const PAGE_SIZE: usize = 4096;

/// Tag identifying a FileDB file
pub const FORMAT_TAG: &[u8; 6] = b"FileDB";

/// Current file format version
pub const FORMAT_VERSION: u16 = 1;

/// On-disk encoding of a missing page link
pub const NONE_PAGE_ID: u32 = u32::MAX;

/// Index page header, padded beyond its 6 used bytes
pub const INDEX_PAGE_HEADER_SIZE: usize = 46;

/// Node slots per index page
pub const NODES_PER_PAGE: usize = 50;

/// Size of one encoded index node
pub const INDEX_NODE_SIZE: usize = 81;

/// Fixed width of the stored file name
pub const FILE_NAME_SIZE: usize = 41;

/// Fixed width of the stored file extension
pub const FILE_EXTENSION_SIZE: usize = 5;

/// Data page header: type, next, empty flag, data length
pub const DATA_PAGE_HEADER_SIZE: usize = 8;

/// Payload capacity of one data page
pub const DATA_PER_PAGE: usize = PAGE_SIZE - DATA_PAGE_HEADER_SIZE;

/// File offset of a page
pub fn page_offset(page_id: PageId) -> u64 {
    HEADER_SIZE as u64 + page_id as u64 * PAGE_SIZE as u64
}

pub(crate) fn encode_page_id(page_id: Option<PageId>) -> u32 {
    page_id.unwrap_or(NONE_PAGE_ID)
}

pub(crate) fn decode_page_id(raw: u32) -> Option<PageId> {
    if raw == NONE_PAGE_ID {
        None
    } else {
        Some(raw)
    }
}
