//! Pager
//!
//! Raw header and page I/O over a seekable byte backend.

use std::fs::File;
use std::io::{self, Cursor, ErrorKind, Read, Seek, SeekFrom, Write};

use tracing::trace;

use crate::error::{FileDbError, Result};

use super::{page_offset, DataPage, Header, IndexPage, PageId, HEADER_SIZE, PAGE_SIZE};

/// A byte store the pager can address by offset
///
/// Implemented for `File` and for in-memory `Cursor<Vec<u8>>` buffers.
pub trait Backend: Read + Write + Seek {
    /// Force written bytes to durable storage
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl Backend for File {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl Backend for Cursor<Vec<u8>> {}

/// Reads and writes the header and whole pages
pub struct Pager<S> {
    backend: S,
}

impl<S: Backend> Pager<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Header
    // =========================================================================

    pub fn read_header(&mut self) -> Result<Header> {
        self.backend.seek(SeekFrom::Start(0))?;
        let mut bytes = [0u8; HEADER_SIZE];
        match self.backend.read_exact(&mut bytes) {
            Ok(()) => Header::decode(&bytes),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(FileDbError::InvalidFormat(
                "file is shorter than the header".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        trace!(last_page_id = header.last_page_id, "write header");
        self.backend.seek(SeekFrom::Start(0))?;
        self.backend.write_all(&header.encode())?;
        Ok(())
    }

    // =========================================================================
    // Pages
    // =========================================================================

    pub fn read_index_page(&mut self, page_id: PageId) -> Result<IndexPage> {
        let bytes = self.read_raw(page_id)?;
        IndexPage::decode(page_id, &bytes)
    }

    pub fn write_index_page(&mut self, page: &IndexPage) -> Result<()> {
        trace!(page_id = page.page_id, nodes = page.nodes.len(), "write index page");
        self.write_raw(page.page_id, &page.encode())
    }

    pub fn read_data_page(&mut self, page_id: PageId) -> Result<DataPage> {
        let bytes = self.read_raw(page_id)?;
        DataPage::decode(page_id, &bytes)
    }

    pub fn write_data_page(&mut self, page: &DataPage) -> Result<()> {
        trace!(
            page_id = page.page_id,
            len = page.data.len(),
            empty = page.is_empty,
            "write data page"
        );
        self.write_raw(page.page_id, &page.encode())
    }

    fn read_raw(&mut self, page_id: PageId) -> Result<Vec<u8>> {
        self.backend.seek(SeekFrom::Start(page_offset(page_id)))?;
        let mut bytes = vec![0u8; PAGE_SIZE];
        match self.backend.read_exact(&mut bytes) {
            Ok(()) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(FileDbError::Corrupted(
                format!("page {} lies beyond the end of the file", page_id),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn write_raw(&mut self, page_id: PageId, bytes: &[u8]) -> Result<()> {
        self.backend.seek(SeekFrom::Start(page_offset(page_id)))?;
        self.backend.write_all(bytes)?;
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush buffered bytes; with `sync`, also force them to disk
    pub fn flush(&mut self, sync: bool) -> Result<()> {
        if sync {
            self.backend.sync()?;
        } else {
            self.backend.flush()?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.backend
    }
}
