//! Free List
//!
//! FIFO singly linked list of reclaimed data pages. The header keeps both
//! ends: pops take the head, reclaimed chains are spliced onto the tail.

use tracing::debug;

use crate::error::{FileDbError, Result};

use super::{Backend, DataPage, PageFile, PageId};

impl<S: Backend> PageFile<S> {
    /// Get a data page to write into
    ///
    /// Pops the free list head when there is one, else grows the file. A
    /// popped page keeps its old `next_page_id` until the chain writer
    /// overwrites or severs it.
    pub fn acquire_data_page(&mut self) -> Result<DataPage> {
        let Some(page_id) = self.header.free_data_page_id else {
            let page_id = self.allocate_page_id()?;
            return Ok(DataPage::new(page_id));
        };

        self.check_page_id(page_id)?;
        let page = self.pager.read_data_page(page_id)?;
        if !page.is_empty {
            return Err(FileDbError::NonEmptyPageExpectedEmpty(page_id));
        }

        match page.next_page_id {
            Some(next) => self.header.free_data_page_id = Some(next),
            None => {
                if self.header.last_free_data_page_id != Some(page_id) {
                    return Err(FileDbError::FreeListInvariantViolation(format!(
                        "list ends at page {} but tail is {:?}",
                        page_id, self.header.last_free_data_page_id
                    )));
                }
                self.header.free_data_page_id = None;
                self.header.last_free_data_page_id = None;
            }
        }
        self.header.dirty = true;

        debug!(page_id, "reused free data page");
        Ok(page)
    }

    /// Splice the chain `first..=last` onto the free list tail
    pub(super) fn append_free_chain(&mut self, first: PageId, last: PageId) -> Result<()> {
        match (self.header.free_data_page_id, self.header.last_free_data_page_id) {
            (None, None) => {
                self.header.free_data_page_id = Some(first);
            }
            (Some(_), Some(tail)) => {
                let mut tail_page = self.pager.read_data_page(tail)?;
                if !tail_page.is_empty || tail_page.next_page_id.is_some() {
                    return Err(FileDbError::FreeListInvariantViolation(format!(
                        "tail page {} is_empty={} next={:?}",
                        tail, tail_page.is_empty, tail_page.next_page_id
                    )));
                }
                tail_page.next_page_id = Some(first);
                self.pager.write_data_page(&tail_page)?;
            }
            (head, tail) => {
                return Err(FileDbError::FreeListInvariantViolation(format!(
                    "head {:?} and tail {:?} disagree on emptiness",
                    head, tail
                )));
            }
        }

        self.header.last_free_data_page_id = Some(last);
        self.header.dirty = true;
        Ok(())
    }

    /// Push a single empty page onto the free list head
    pub(super) fn push_free_head(&mut self, page_id: PageId) -> Result<()> {
        self.check_page_id(page_id)?;
        let mut page = self.pager.read_data_page(page_id)?;
        if !page.is_empty {
            return Err(FileDbError::NonEmptyPageExpectedEmpty(page_id));
        }

        page.next_page_id = self.header.free_data_page_id;
        self.pager.write_data_page(&page)?;

        if self.header.last_free_data_page_id.is_none() {
            self.header.last_free_data_page_id = Some(page_id);
        }
        self.header.free_data_page_id = Some(page_id);
        self.header.dirty = true;
        Ok(())
    }

    /// Page ids on the free list, head first
    pub fn free_page_ids(&mut self) -> Result<Vec<PageId>> {
        let mut ids = Vec::new();
        let mut current = self.header.free_data_page_id;
        let max_hops = self.max_chain_hops();

        while let Some(page_id) = current {
            if ids.len() as u64 >= max_hops {
                return Err(FileDbError::FreeListInvariantViolation(
                    "free list contains a cycle".to_string(),
                ));
            }
            self.check_page_id(page_id)?;
            ids.push(page_id);
            current = self.pager.read_data_page(page_id)?.next_page_id;
        }

        if ids.last().copied() != self.header.last_free_data_page_id {
            return Err(FileDbError::FreeListInvariantViolation(format!(
                "list ends at {:?} but tail is {:?}",
                ids.last(),
                self.header.last_free_data_page_id
            )));
        }
        Ok(ids)
    }
}
