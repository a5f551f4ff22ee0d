//! Data Chunk Chain
//!
//! A blob's bytes live in a singly linked list of data pages, each holding
//! up to `DATA_PER_PAGE` bytes. Chains are written once, read front to back
//! and reclaimed as a whole onto the free list.

use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::debug;

use crate::error::{FileDbError, Result};

use super::{Backend, PageFile, PageId, Pager, DATA_PER_PAGE};

impl<S: Backend> PageFile<S> {
    /// Write `reader` to a new chain
    ///
    /// Returns the first page id and the number of bytes written. An empty
    /// stream still occupies one page. Every page is written to the backend
    /// before this returns.
    pub fn write_chain<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<(PageId, u64)> {
        let mut block = vec![0u8; DATA_PER_PAGE];
        let mut lookahead = vec![0u8; DATA_PER_PAGE];
        let mut len = read_block(reader, &mut block)?;
        let mut total = 0u64;
        let mut pages = 1usize;

        let mut page = self.acquire_data_page()?;
        let first = page.page_id;

        loop {
            total += len as u64;
            if total > u32::MAX as u64 {
                return Err(FileDbError::PayloadTooLarge(total));
            }
            page.is_empty = false;
            page.data.clear();
            page.data.extend_from_slice(&block[..len]);

            let next_len = if len == DATA_PER_PAGE {
                read_block(reader, &mut lookahead)?
            } else {
                0
            };

            if next_len == 0 {
                let stale = page.next_page_id.take();
                self.pager.write_data_page(&page)?;
                if let Some(stale) = stale {
                    self.release_stale_link(page.page_id, stale)?;
                }
                break;
            }

            let next = self.acquire_data_page()?;
            page.next_page_id = Some(next.page_id);
            self.pager.write_data_page(&page)?;

            page = next;
            std::mem::swap(&mut block, &mut lookahead);
            len = next_len;
            pages += 1;
        }

        debug!(first_page_id = first, pages, bytes = total, "wrote data chain");
        Ok((first, total))
    }

    /// Copy the chain starting at `first` into `sink`
    pub fn read_chain<W: Write + ?Sized>(&mut self, first: PageId, sink: &mut W) -> Result<u64> {
        let mut reader = self.open_chain(first)?;
        let copied = io::copy(&mut reader, sink).map_err(unwrap_io)?;
        Ok(copied)
    }

    /// Forward-only reader over the chain starting at `first`
    pub fn open_chain(&mut self, first: PageId) -> Result<ChainReader<'_, S>> {
        self.check_page_id(first)?;
        let hops_left = self.max_chain_hops();
        Ok(ChainReader {
            pager: &mut self.pager,
            next_page_id: Some(first),
            buffer: Vec::new(),
            pos: 0,
            hops_left,
        })
    }

    /// Page ids of the chain starting at `first`
    pub fn chain_page_ids(&mut self, first: PageId) -> Result<Vec<PageId>> {
        let mut ids = Vec::new();
        let mut current = Some(first);
        let max_hops = self.max_chain_hops();

        while let Some(page_id) = current {
            if ids.len() as u64 >= max_hops {
                return Err(FileDbError::Corrupted(
                    "data chain contains a cycle".to_string(),
                ));
            }
            self.check_page_id(page_id)?;
            ids.push(page_id);
            current = self.pager.read_data_page(page_id)?.next_page_id;
        }
        Ok(ids)
    }

    /// Mark every page of a chain empty and append it to the free list
    pub fn reclaim_chain(&mut self, first: PageId) -> Result<()> {
        let mut current = Some(first);
        let mut last = first;
        let mut hops = 0u64;
        let max_hops = self.max_chain_hops();

        while let Some(page_id) = current {
            hops += 1;
            if hops > max_hops {
                return Err(FileDbError::Corrupted(
                    "data chain contains a cycle".to_string(),
                ));
            }
            self.check_page_id(page_id)?;

            let mut page = self.pager.read_data_page(page_id)?;
            page.is_empty = true;
            self.pager.write_data_page(&page)?;

            last = page_id;
            current = page.next_page_id;
        }

        self.append_free_chain(first, last)?;
        debug!(first_page_id = first, last_page_id = last, pages = hops, "reclaimed data chain");
        Ok(())
    }

    /// Handle a forward link left on the final page of a new chain
    ///
    /// The link has already been cut from `owner`. If the page it pointed to
    /// is not the free list head, it would be orphaned, so push it back.
    fn release_stale_link(&mut self, owner: PageId, stale: PageId) -> Result<()> {
        if self.header.free_data_page_id == Some(stale) {
            return Ok(());
        }
        debug!(page_id = owner, stale, "returning orphaned page to free list");
        self.push_free_head(stale)
    }
}

// =============================================================================
// Chain Reader
// =============================================================================

/// Forward-only, non-seekable cursor over one data chain
///
/// Reads page by page without materializing the blob. `Seek` and `Write`
/// fail with `UnsupportedOperation`; open a new reader to start over.
pub struct ChainReader<'a, S> {
    pager: &'a mut Pager<S>,
    next_page_id: Option<PageId>,
    buffer: Vec<u8>,
    pos: usize,
    hops_left: u64,
}

impl<S: Backend> ChainReader<'_, S> {
    fn fill(&mut self) -> Result<bool> {
        while self.pos >= self.buffer.len() {
            let Some(page_id) = self.next_page_id else {
                return Ok(false);
            };
            if self.hops_left == 0 {
                return Err(FileDbError::Corrupted(
                    "data chain contains a cycle".to_string(),
                ));
            }
            self.hops_left -= 1;

            let page = self.pager.read_data_page(page_id)?;
            if page.is_empty {
                return Err(FileDbError::Corrupted(format!(
                    "data page {} of a live chain is marked empty",
                    page_id
                )));
            }
            self.next_page_id = page.next_page_id;
            self.buffer = page.data;
            self.pos = 0;
        }
        Ok(true)
    }
}

impl<S: Backend> Read for ChainReader<'_, S> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() || !self.fill()? {
            return Ok(0);
        }
        let n = out.len().min(self.buffer.len() - self.pos);
        out[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl<S> Seek for ChainReader<'_, S> {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(FileDbError::UnsupportedOperation("seek on a forward-only chain reader").into())
    }
}

impl<S> Write for ChainReader<'_, S> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(FileDbError::UnsupportedOperation("write through a chain reader").into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Fill `block` from `reader`; short only at end of stream
fn read_block<R: Read + ?Sized>(reader: &mut R, block: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        match reader.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(unwrap_io(e)),
        }
    }
    Ok(filled)
}

/// Recover a `FileDbError` that was boxed into an `io::Error` by the reader
fn unwrap_io(err: io::Error) -> FileDbError {
    if err.get_ref().map_or(false, |inner| inner.is::<FileDbError>()) {
        match err.into_inner().map(|inner| inner.downcast::<FileDbError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => FileDbError::Io(io::Error::other(other)),
            None => FileDbError::Corrupted("unreadable chain error".to_string()),
        }
    } else {
        FileDbError::Io(err)
    }
}
