//! File Header
//!
//! The fixed 100-byte preamble holding the allocation pointers.

use bytes::{Buf, BufMut};

use crate::error::{FileDbError, Result};

use super::{
    decode_page_id, encode_page_id, PageId, FORMAT_TAG, FORMAT_VERSION, HEADER_SIZE,
};

/// In-memory copy of the file header
///
/// Mutated by every structural change and written back only at flush
/// points; `dirty` is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Page holding the BST root node (slot 0)
    pub index_root_page_id: PageId,

    /// Arena frontier: index page accepting new nodes
    pub free_index_page_id: PageId,

    /// Head of the free data page list
    pub free_data_page_id: Option<PageId>,

    /// Tail of the free data page list
    pub last_free_data_page_id: Option<PageId>,

    /// Highest page id ever allocated
    pub last_page_id: PageId,

    /// Header differs from the on-disk copy
    pub dirty: bool,
}

impl Header {
    /// Header of a freshly initialized file: root and frontier at page 0
    pub fn new() -> Self {
        Self {
            index_root_page_id: 0,
            free_index_page_id: 0,
            free_data_page_id: None,
            last_free_data_page_id: None,
            last_page_id: 0,
            dirty: true,
        }
    }

    /// Encode to exactly `HEADER_SIZE` bytes
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_slice(FORMAT_TAG);
        buf.put_u16_le(FORMAT_VERSION);
        buf.put_u32_le(self.index_root_page_id);
        buf.put_u32_le(self.free_index_page_id);
        buf.put_u32_le(encode_page_id(self.free_data_page_id));
        buf.put_u32_le(encode_page_id(self.last_free_data_page_id));
        buf.put_u32_le(self.last_page_id);
        out
    }

    /// Decode and validate the tag and version
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FileDbError::InvalidFormat(format!(
                "header too short: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut buf = &bytes[..HEADER_SIZE];
        let mut tag = [0u8; 6];
        buf.copy_to_slice(&mut tag);
        if &tag != FORMAT_TAG {
            return Err(FileDbError::InvalidFormat(format!(
                "bad file tag: expected {:?}, got {:?}",
                String::from_utf8_lossy(FORMAT_TAG),
                String::from_utf8_lossy(&tag)
            )));
        }

        let version = buf.get_u16_le();
        if version != FORMAT_VERSION {
            return Err(FileDbError::UnsupportedVersion(version));
        }

        Ok(Self {
            index_root_page_id: buf.get_u32_le(),
            free_index_page_id: buf.get_u32_le(),
            free_data_page_id: decode_page_id(buf.get_u32_le()),
            last_free_data_page_id: decode_page_id(buf.get_u32_le()),
            last_page_id: buf.get_u32_le(),
            dirty: false,
        })
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}
