//! Index Page Cache
//!
//! Bounded map from page id to resident index page, with dirty tracking and
//! write-back on eviction.
//!
//! ## Eviction
//! When full, any resident page other than the root is written back (if
//! dirty) and dropped. The victim is simply the first candidate found while
//! iterating the map; callers must not rely on which pages survive.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{FileDbError, Result};

use super::{Backend, IndexPage, PageId, Pager};

struct CachedPage {
    page: IndexPage,
    dirty: bool,
}

/// Cache of index pages; the root page is pinned
pub struct IndexCache {
    pages: HashMap<PageId, CachedPage>,
    capacity: usize,
    root_page_id: PageId,
}

impl IndexCache {
    pub fn new(capacity: usize, root_page_id: PageId) -> Self {
        Self {
            pages: HashMap::with_capacity(capacity),
            capacity: capacity.max(2),
            root_page_id,
        }
    }

    /// Cached page, loading it from disk on a miss
    pub fn get_page<S: Backend>(
        &mut self,
        pager: &mut Pager<S>,
        page_id: PageId,
    ) -> Result<&IndexPage> {
        self.load(pager, page_id)?;
        self.pages
            .get(&page_id)
            .map(|cached| &cached.page)
            .ok_or_else(|| missing(page_id))
    }

    /// Like `get_page`, but flags the page dirty
    pub fn get_page_mut<S: Backend>(
        &mut self,
        pager: &mut Pager<S>,
        page_id: PageId,
    ) -> Result<&mut IndexPage> {
        self.load(pager, page_id)?;
        let cached = self.pages.get_mut(&page_id).ok_or_else(|| missing(page_id))?;
        cached.dirty = true;
        Ok(&mut cached.page)
    }

    /// Insert a page if it is not resident; optionally flag it dirty
    pub fn add_page<S: Backend>(
        &mut self,
        pager: &mut Pager<S>,
        page: IndexPage,
        mark_dirty: bool,
    ) -> Result<()> {
        let page_id = page.page_id;
        if !self.pages.contains_key(&page_id) {
            self.make_room(pager, page_id)?;
            self.pages.insert(page_id, CachedPage { page, dirty: false });
        }
        if mark_dirty {
            if let Some(cached) = self.pages.get_mut(&page_id) {
                cached.dirty = true;
            }
        }
        Ok(())
    }

    /// Write back every dirty page and clear the flags
    ///
    /// Returns the number of pages written.
    pub fn persist_pages<S: Backend>(&mut self, pager: &mut Pager<S>) -> Result<usize> {
        let mut written = 0;
        for cached in self.pages.values_mut().filter(|c| c.dirty) {
            pager.write_index_page(&cached.page)?;
            cached.dirty = false;
            written += 1;
        }
        Ok(written)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.contains_key(&page_id)
    }

    pub fn dirty_count(&self) -> usize {
        self.pages.values().filter(|c| c.dirty).count()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn load<S: Backend>(&mut self, pager: &mut Pager<S>, page_id: PageId) -> Result<()> {
        if self.pages.contains_key(&page_id) {
            return Ok(());
        }
        let page = pager.read_index_page(page_id)?;
        self.make_room(pager, page_id)?;
        self.pages.insert(page_id, CachedPage { page, dirty: false });
        Ok(())
    }

    /// Evict one non-root page if inserting `incoming` would exceed capacity
    fn make_room<S: Backend>(&mut self, pager: &mut Pager<S>, incoming: PageId) -> Result<()> {
        if self.pages.len() < self.capacity {
            return Ok(());
        }

        let victim = self
            .pages
            .keys()
            .copied()
            .find(|&id| id != self.root_page_id && id != incoming);

        if let Some(victim) = victim {
            if let Some(cached) = self.pages.remove(&victim) {
                if cached.dirty {
                    pager.write_index_page(&cached.page)?;
                }
                debug!(page_id = victim, dirty = cached.dirty, "evicted index page");
            }
        }
        Ok(())
    }
}

fn missing(page_id: PageId) -> FileDbError {
    FileDbError::Corrupted(format!("index page {} vanished from the cache", page_id))
}
