//! Page File
//!
//! Owns the pager, the in-memory header and the index page cache for one
//! open file. The BST, chunk chain and free list operations are implemented
//! on this type in their own modules.
//!
//! ## Flush Domains
//! - Data pages are written to the backend as soon as they are filled.
//! - Index pages and the header stay in memory until `flush`.

use tracing::debug;

use crate::error::{FileDbError, Result};

use super::{Backend, Header, IndexCache, IndexNode, IndexPage, PageId, Pager};

/// All mutable state of one open database file
pub struct PageFile<S> {
    pub(super) pager: Pager<S>,
    pub(super) header: Header,
    pub(super) cache: IndexCache,
}

impl<S: Backend> PageFile<S> {
    /// Initialize an empty backend: header plus the root index page
    ///
    /// Both are written immediately so the file is valid on disk even if the
    /// caller never flushes.
    pub fn create(backend: S, cache_capacity: usize) -> Result<Self> {
        let mut pager = Pager::new(backend);
        let mut header = Header::new();
        let root = IndexPage::new(header.index_root_page_id, IndexNode::root());

        pager.write_header(&header)?;
        pager.write_index_page(&root)?;
        header.dirty = false;

        let mut cache = IndexCache::new(cache_capacity, header.index_root_page_id);
        cache.add_page(&mut pager, root, false)?;

        debug!("initialized new file");
        Ok(Self {
            pager,
            header,
            cache,
        })
    }

    /// Load an existing backend, validating the header
    pub fn load(backend: S, cache_capacity: usize) -> Result<Self> {
        let mut pager = Pager::new(backend);
        let header = pager.read_header()?;

        if header.free_index_page_id > header.last_page_id
            || header.index_root_page_id > header.last_page_id
        {
            return Err(FileDbError::Corrupted(format!(
                "header points past last page {}",
                header.last_page_id
            )));
        }

        let mut cache = IndexCache::new(cache_capacity, header.index_root_page_id);
        // pin the root
        cache.get_page(&mut pager, header.index_root_page_id)?;

        debug!(
            last_page_id = header.last_page_id,
            free_data_page_id = ?header.free_data_page_id,
            "loaded file header"
        );
        Ok(Self {
            pager,
            header,
            cache,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    pub fn mark_header_dirty(&mut self) {
        self.header.dirty = true;
    }

    /// True when index pages or the header are not yet on disk
    pub fn has_unflushed_changes(&self) -> bool {
        self.header.dirty || self.cache.dirty_count() > 0
    }

    /// Persist dirty index pages, then the header
    pub fn flush(&mut self, sync: bool) -> Result<()> {
        let written = self.cache.persist_pages(&mut self.pager)?;
        let header_dirty = self.header.dirty;
        if header_dirty {
            self.pager.write_header(&self.header)?;
            self.header.dirty = false;
        }
        self.pager.flush(sync)?;
        debug!(index_pages = written, header = header_dirty, "flushed");
        Ok(())
    }

    /// Discard in-memory state without writing it
    pub fn into_inner(self) -> S {
        self.pager.into_inner()
    }

    // =========================================================================
    // Shared Helpers
    // =========================================================================

    /// Grow the file by one page id
    pub(super) fn allocate_page_id(&mut self) -> Result<PageId> {
        let next = self.header.last_page_id.checked_add(1).filter(|&id| id != u32::MAX);
        let page_id = next.ok_or_else(|| {
            FileDbError::Corrupted("page id space exhausted".to_string())
        })?;
        self.header.last_page_id = page_id;
        self.header.dirty = true;
        Ok(page_id)
    }

    /// Reject links that point past the allocated arena
    pub(super) fn check_page_id(&self, page_id: PageId) -> Result<()> {
        if page_id > self.header.last_page_id {
            return Err(FileDbError::Corrupted(format!(
                "link to page {} beyond last page {}",
                page_id, self.header.last_page_id
            )));
        }
        Ok(())
    }

    /// Upper bound on hops through any page chain; more means a cycle
    pub(super) fn max_chain_hops(&self) -> u64 {
        self.header.last_page_id as u64 + 1
    }
}
