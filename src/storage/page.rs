//! Page Codec
//!
//! Translates index and data pages between their in-memory records and the
//! fixed-size on-disk layout described in the module docs of `storage`.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::error::{FileDbError, Result};

use super::{
    decode_page_id, encode_page_id, PageId, DATA_PAGE_HEADER_SIZE, DATA_PER_PAGE,
    FILE_EXTENSION_SIZE, FILE_NAME_SIZE, INDEX_NODE_SIZE, INDEX_PAGE_HEADER_SIZE,
    NODES_PER_PAGE, NONE_PAGE_ID, PAGE_SIZE,
};

/// Page type tag (first byte of every page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    Data = 0x01,
    Index = 0x02,
}

impl PageType {
    fn expect(page_id: PageId, expected: PageType, found: u8) -> Result<()> {
        if found == expected as u8 {
            Ok(())
        } else {
            Err(FileDbError::Corrupted(format!(
                "page {} has type tag {}, expected {:?}",
                page_id, found, expected
            )))
        }
    }
}

// =============================================================================
// Node Address
// =============================================================================

/// Location of an index node: an arena index, not a pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub page_id: PageId,
    pub slot: u8,
}

impl NodeAddress {
    pub fn new(page_id: PageId, slot: u8) -> Self {
        Self { page_id, slot }
    }

    fn put(link: Option<NodeAddress>, buf: &mut impl BufMut) {
        match link {
            Some(addr) => {
                buf.put_u8(addr.slot);
                buf.put_u32_le(addr.page_id);
            }
            None => {
                buf.put_u8(0);
                buf.put_u32_le(NONE_PAGE_ID);
            }
        }
    }

    fn get(page_id: PageId, buf: &mut impl Buf) -> Result<Option<NodeAddress>> {
        let slot = buf.get_u8();
        let target = buf.get_u32_le();
        if target == NONE_PAGE_ID {
            return Ok(None);
        }
        if slot as usize >= NODES_PER_PAGE {
            return Err(FileDbError::Corrupted(format!(
                "index page {} links to slot {} (max {})",
                page_id,
                slot,
                NODES_PER_PAGE - 1
            )));
        }
        Ok(Some(NodeAddress::new(target, slot)))
    }
}

// =============================================================================
// Index Node
// =============================================================================

/// A BST vertex stored in an index page slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNode {
    pub id: Uuid,
    pub is_deleted: bool,
    pub right: Option<NodeAddress>,
    pub left: Option<NodeAddress>,
    /// Head of this entry's data chain
    pub data_page_id: Option<PageId>,
    pub file_name: String,
    pub file_extension: String,
    pub file_length: u32,
}

impl IndexNode {
    /// Create a live node; name and extension are cut to their field widths
    pub fn new(id: Uuid, file_name: &str, file_extension: &str) -> Self {
        Self {
            id,
            is_deleted: false,
            right: None,
            left: None,
            data_page_id: None,
            file_name: truncate_utf8(file_name, FILE_NAME_SIZE).to_string(),
            file_extension: truncate_utf8(file_extension, FILE_EXTENSION_SIZE).to_string(),
            file_length: 0,
        }
    }

    /// The tombstoned nil-id node at the root slot
    pub fn root() -> Self {
        Self {
            is_deleted: true,
            ..Self::new(Uuid::nil(), "", "")
        }
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(self.id.as_bytes());
        buf.put_u8(self.is_deleted as u8);
        NodeAddress::put(self.right, buf);
        NodeAddress::put(self.left, buf);
        buf.put_u32_le(encode_page_id(self.data_page_id));
        put_fixed_str(buf, &self.file_name, FILE_NAME_SIZE);
        put_fixed_str(buf, &self.file_extension, FILE_EXTENSION_SIZE);
        buf.put_u32_le(self.file_length);
    }

    fn decode(page_id: PageId, buf: &mut impl Buf) -> Result<Self> {
        let mut id = [0u8; 16];
        buf.copy_to_slice(&mut id);
        let is_deleted = buf.get_u8() != 0;
        let right = NodeAddress::get(page_id, buf)?;
        let left = NodeAddress::get(page_id, buf)?;
        let data_page_id = decode_page_id(buf.get_u32_le());
        let file_name = get_fixed_str(buf, FILE_NAME_SIZE);
        let file_extension = get_fixed_str(buf, FILE_EXTENSION_SIZE);
        let file_length = buf.get_u32_le();

        Ok(Self {
            id: Uuid::from_bytes(id),
            is_deleted,
            right,
            left,
            data_page_id,
            file_name,
            file_extension,
            file_length,
        })
    }
}

// =============================================================================
// Index Page
// =============================================================================

/// A page of index node slots, filled left to right
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPage {
    pub page_id: PageId,
    pub next_page_id: Option<PageId>,
    /// Slots in use; never sparse, never longer than `NODES_PER_PAGE`
    pub nodes: Vec<IndexNode>,
}

impl IndexPage {
    /// A new page whose first slot holds `first`
    pub fn new(page_id: PageId, first: IndexNode) -> Self {
        let mut nodes = Vec::with_capacity(NODES_PER_PAGE);
        nodes.push(first);
        Self {
            page_id,
            next_page_id: None,
            nodes,
        }
    }

    pub fn is_full(&self) -> bool {
        self.nodes.len() >= NODES_PER_PAGE
    }

    /// Node at `slot`, or `Corrupted` if the slot is not in use
    pub fn node(&self, slot: u8) -> Result<&IndexNode> {
        self.nodes.get(slot as usize).ok_or_else(|| self.bad_slot(slot))
    }

    pub fn node_mut(&mut self, slot: u8) -> Result<&mut IndexNode> {
        if (slot as usize) < self.nodes.len() {
            Ok(&mut self.nodes[slot as usize])
        } else {
            Err(self.bad_slot(slot))
        }
    }

    fn bad_slot(&self, slot: u8) -> FileDbError {
        FileDbError::Corrupted(format!(
            "slot {} of index page {} is not in use ({} nodes)",
            slot,
            self.page_id,
            self.nodes.len()
        ))
    }

    /// Encode to exactly `PAGE_SIZE` bytes
    ///
    /// The count byte stores `node_count - 1`, so a page always carries at
    /// least one node.
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(!self.nodes.is_empty() && self.nodes.len() <= NODES_PER_PAGE);

        let mut out = vec![0u8; PAGE_SIZE];
        {
            let mut buf = &mut out[..INDEX_PAGE_HEADER_SIZE];
            buf.put_u8(PageType::Index as u8);
            buf.put_u32_le(encode_page_id(self.next_page_id));
            buf.put_u8(self.nodes.len().saturating_sub(1) as u8);
        }

        for (slot, node) in self.nodes.iter().enumerate() {
            let start = INDEX_PAGE_HEADER_SIZE + slot * INDEX_NODE_SIZE;
            let mut buf = &mut out[start..start + INDEX_NODE_SIZE];
            node.encode(&mut buf);
        }
        out
    }

    pub fn decode(page_id: PageId, bytes: &[u8]) -> Result<Self> {
        check_page_len(page_id, bytes)?;

        let mut buf = &bytes[..INDEX_PAGE_HEADER_SIZE];
        PageType::expect(page_id, PageType::Index, buf.get_u8())?;
        let next_page_id = decode_page_id(buf.get_u32_le());
        let node_count = buf.get_u8() as usize + 1;
        if node_count > NODES_PER_PAGE {
            return Err(FileDbError::Corrupted(format!(
                "index page {} claims {} nodes (max {})",
                page_id, node_count, NODES_PER_PAGE
            )));
        }

        let mut nodes = Vec::with_capacity(NODES_PER_PAGE);
        for slot in 0..node_count {
            let start = INDEX_PAGE_HEADER_SIZE + slot * INDEX_NODE_SIZE;
            let mut buf = &bytes[start..start + INDEX_NODE_SIZE];
            nodes.push(IndexNode::decode(page_id, &mut buf)?);
        }

        Ok(Self {
            page_id,
            next_page_id,
            nodes,
        })
    }
}

// =============================================================================
// Data Page
// =============================================================================

/// One link of a blob's chunk chain; data pages are never cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPage {
    pub page_id: PageId,
    pub next_page_id: Option<PageId>,
    /// Reclaimable; content is invalid
    pub is_empty: bool,
    /// Used payload bytes (`data.len()` is the on-disk data length)
    pub data: Vec<u8>,
}

impl DataPage {
    /// A brand-new page, not yet linked or filled
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            next_page_id: None,
            is_empty: true,
            data: Vec::new(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.data.len() <= DATA_PER_PAGE);

        let mut out = Vec::with_capacity(PAGE_SIZE);
        out.put_u8(PageType::Data as u8);
        out.put_u32_le(encode_page_id(self.next_page_id));
        out.put_u8(self.is_empty as u8);
        out.put_u16_le(self.data.len() as u16);
        out.put_slice(&self.data);
        out.resize(PAGE_SIZE, 0);
        out
    }

    pub fn decode(page_id: PageId, bytes: &[u8]) -> Result<Self> {
        check_page_len(page_id, bytes)?;

        let mut buf = &bytes[..DATA_PAGE_HEADER_SIZE];
        PageType::expect(page_id, PageType::Data, buf.get_u8())?;
        let next_page_id = decode_page_id(buf.get_u32_le());
        let is_empty = buf.get_u8() != 0;
        let data_length = buf.get_u16_le() as usize;
        if data_length > DATA_PER_PAGE {
            return Err(FileDbError::Corrupted(format!(
                "data page {} claims {} bytes (max {})",
                page_id, data_length, DATA_PER_PAGE
            )));
        }

        let start = DATA_PAGE_HEADER_SIZE;
        Ok(Self {
            page_id,
            next_page_id,
            is_empty,
            data: bytes[start..start + data_length].to_vec(),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn check_page_len(page_id: PageId, bytes: &[u8]) -> Result<()> {
    if bytes.len() < PAGE_SIZE {
        return Err(FileDbError::Corrupted(format!(
            "page {} is {} bytes, expected {}",
            page_id,
            bytes.len(),
            PAGE_SIZE
        )));
    }
    Ok(())
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn put_fixed_str(buf: &mut impl BufMut, s: &str, width: usize) {
    let s = truncate_utf8(s, width);
    buf.put_slice(s.as_bytes());
    buf.put_bytes(0, width - s.len());
}

fn get_fixed_str(buf: &mut impl Buf, width: usize) -> String {
    let mut raw = vec![0u8; width];
    buf.copy_to_slice(&mut raw);
    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
