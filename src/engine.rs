//! Engine Module
//!
//! The blob store API that coordinates the index, data chains and free list.
//!
//! ## Responsibilities
//! - Derive content-addressed ids and insert index nodes
//! - Write, read and reclaim data chains
//! - Flush index pages and the header at explicit points
//! - Out-of-place compaction (shrink) and export

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AccessMode, Config};
use crate::entry::{split_name, Entry};
use crate::error::{FileDbError, Result};
use crate::identifier::derive_id;
use crate::storage::{Backend, ChainReader, Header, IndexNode, PageFile, PageId};

/// Default pattern for `FileDb::export`
pub const DEFAULT_EXPORT_PATTERN: &str = "{filename}.{id}.{extension}";

/// The main blob store handle
///
/// ## Concurrency Model: Single Owner
///
/// Every operation takes `&mut self`; there is no internal locking. Share a
/// handle across threads only behind a lock of the caller's choosing.
///
/// ## Durability
/// - Data pages reach the backend during `store`/`delete`.
/// - Index pages and the header reach it only on `flush`/`close`.
///
/// Dropping a handle without `close` loses index changes made since the last
/// flush; data pages written in that window stay allocated but unreferenced
/// until the next `shrink`.
pub struct FileDb<S: Backend = File> {
    /// Engine configuration
    config: Config,

    /// Pager, header and index cache for the open file
    file: PageFile<S>,
}

/// Counters describing the file layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub last_page_id: PageId,
    pub index_pages: usize,
    pub live_entries: usize,
    /// Tombstoned entries (the root sentinel is not counted)
    pub deleted_entries: usize,
    pub free_data_pages: usize,
    pub cached_index_pages: usize,
}

/// Outcome of `FileDb::shrink`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShrinkReport {
    pub entries: usize,
    pub last_page_id_before: PageId,
    pub last_page_id_after: PageId,
}

// =============================================================================
// File-backed handles
// =============================================================================

impl FileDb<File> {
    /// Open or create a database file with the given config
    ///
    /// On startup:
    /// 1. Validate config
    /// 2. Open the file (creating it if allowed)
    /// 3. Initialize an empty file, or load and validate the header
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Validate config
        config.validate()?;
        let path = config.path.clone();

        // Step 2: Open the file
        if !path.exists() {
            if !config.create_if_missing {
                return Err(FileDbError::NotFound(path));
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        let writable = config.access_mode == AccessMode::ReadWrite;
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .create(writable && config.create_if_missing)
            .open(&path)?;

        // Step 3: Initialize or load
        let db = Self::from_backend(file, config)?;
        info!(path = %path.display(), last_page_id = db.header().last_page_id, "opened database");
        Ok(db)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified file path
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().path(path.as_ref()).build();
        Self::open(config)
    }

    /// Create a new, empty database file; fails if it already exists
    pub fn create_empty(path: impl AsRef<Path>) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        let mut page_file = PageFile::create(file, Config::default().cache_capacity)?;
        page_file.flush(true)
    }

    /// Path of the open file
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Rewrite all live entries into a fresh file and swap it into place
    ///
    /// Steps:
    /// 1. Flush, then copy live entries into `<path>.shrink` (ids are preserved)
    /// 2. Close the copy
    /// 3. Delete the original, rename the copy into place
    /// 4. Reopen into `self`
    ///
    /// If steps 1-2 fail the handle is unchanged and the copy is removed.
    /// Needs free disk space for a second copy of the live data.
    pub fn shrink(&mut self) -> Result<ShrinkReport> {
        self.ensure_writable()?;
        self.flush()?;
        let config = self.config.clone();
        let shrink_path = shrink_path(&config.path);
        let last_page_id_before = self.header().last_page_id;

        // Steps 1-2: Copy live entries
        let target = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&shrink_path)?;
        let (entries, last_page_id_after) = match self.copy_and_close(target) {
            Ok(counts) => counts,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&shrink_path) {
                    warn!(path = %shrink_path.display(), error = %cleanup, "failed to remove shrink copy");
                }
                return Err(e);
            }
        };

        // Step 3: Swap files
        fs::remove_file(&config.path)?;
        fs::rename(&shrink_path, &config.path)?;

        // Step 4: Reopen
        *self = Self::open(config)?;
        let report = ShrinkReport {
            entries,
            last_page_id_before,
            last_page_id_after,
        };
        info!(?report, "shrink complete");
        Ok(report)
    }

    fn copy_and_close(&mut self, target: File) -> Result<(usize, PageId)> {
        let mut compacted = self.compact_into(target)?;
        let entries = compacted.list_files()?.len();
        let last_page_id = compacted.header().last_page_id;
        compacted.close()?;
        Ok((entries, last_page_id))
    }
}

// =============================================================================
// Any backend
// =============================================================================

impl<S: Backend> FileDb<S> {
    /// Open over an arbitrary backend
    ///
    /// An empty backend is initialized (unless read-only); anything else
    /// must carry a valid header.
    pub fn from_backend(mut backend: S, config: Config) -> Result<Self> {
        config.validate()?;
        let len = backend.seek(SeekFrom::End(0))?;

        let file = if len == 0 {
            if config.is_read_only() {
                return Err(FileDbError::InvalidFormat(
                    "empty file opened read-only".to_string(),
                ));
            }
            PageFile::create(backend, config.cache_capacity)?
        } else {
            PageFile::load(backend, config.cache_capacity)?
        };

        Ok(Self { config, file })
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// Store a blob under `name`
    ///
    /// Steps:
    /// 1. Hash the stream to derive the id, then rewind it
    /// 2. Insert the index node (fails on a duplicate id)
    /// 3. Write the data chain
    /// 4. Record the chain head and length on the node
    pub fn store<R: Read + Seek + ?Sized>(&mut self, name: &str, reader: &mut R) -> Result<Entry> {
        self.ensure_writable()?;

        // Step 1: Derive id
        let start = reader.stream_position()?;
        let (id, length) = derive_id(name, reader)?;
        if length > u32::MAX as u64 {
            return Err(FileDbError::PayloadTooLarge(length));
        }
        reader.seek(SeekFrom::Start(start))?;

        // Steps 2-4
        let (file_name, file_extension) = split_name(name);
        self.insert_blob(id, &file_name, &file_extension, reader)
    }

    /// Store an in-memory payload under `name`
    pub fn store_bytes(&mut self, name: &str, payload: &[u8]) -> Result<Entry> {
        self.store(name, &mut Cursor::new(payload))
    }

    fn insert_blob<R: Read + ?Sized>(
        &mut self,
        id: Uuid,
        file_name: &str,
        file_extension: &str,
        reader: &mut R,
    ) -> Result<Entry> {
        let addr = self.file.insert(IndexNode::new(id, file_name, file_extension))?;

        let (first_page_id, length) = match self.file.write_chain(reader) {
            Ok(written) => written,
            Err(e) => {
                // a live node must always own a chain
                self.file.mark_deleted(addr)?;
                return Err(e);
            }
        };

        let node = self.file.node_mut(addr)?;
        node.data_page_id = Some(first_page_id);
        node.file_length = length as u32;
        let entry = Entry::from_node(node);
        self.file.mark_header_dirty();

        debug!(%id, name = %entry.full_name(), bytes = length, "stored entry");
        Ok(entry)
    }

    // =========================================================================
    // Read / Search
    // =========================================================================

    /// Stream the blob `id` into `sink`
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: blob found and copied
    /// - `Ok(None)`: no such id, or it was deleted
    pub fn read<W: Write + ?Sized>(&mut self, id: Uuid, sink: &mut W) -> Result<Option<Entry>> {
        let Some(node) = self.find_live(id)? else {
            return Ok(None);
        };
        let first = chain_head(&node)?;
        self.file.read_chain(first, sink)?;
        Ok(Some(Entry::from_node(&node)))
    }

    /// Read the blob `id` into memory
    pub fn read_to_vec(&mut self, id: Uuid) -> Result<Option<Vec<u8>>> {
        let mut out = Vec::new();
        Ok(self.read(id, &mut out)?.map(|_| out))
    }

    /// Lazy forward-only reader over the blob `id`
    pub fn open_read(&mut self, id: Uuid) -> Result<Option<ChainReader<'_, S>>> {
        let Some(node) = self.find_live(id)? else {
            return Ok(None);
        };
        let first = chain_head(&node)?;
        self.file.open_chain(first).map(Some)
    }

    /// Metadata of `id`, without touching data pages
    pub fn search(&mut self, id: Uuid) -> Result<Option<Entry>> {
        Ok(self.find_live(id)?.map(|node| Entry::from_node(&node)))
    }

    /// All live entries in index page order (not sorted by id)
    pub fn list_files(&mut self) -> Result<Vec<Entry>> {
        Ok(self
            .file
            .list_nodes()?
            .iter()
            .map(Entry::from_node)
            .collect())
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Tombstone `id` and reclaim its data pages
    ///
    /// Returns `false` (and changes nothing) when `id` is absent or deleted.
    pub fn delete(&mut self, id: Uuid) -> Result<bool> {
        self.ensure_writable()?;

        let Some(addr) = self.file.search(id)? else {
            return Ok(false);
        };
        let node = self.file.node(addr)?;
        if node.is_deleted {
            return Ok(false);
        }
        let first = node.data_page_id;

        self.file.mark_deleted(addr)?;
        if let Some(first) = first {
            self.file.reclaim_chain(first)?;
        }
        self.file.mark_header_dirty();

        debug!(%id, "deleted entry");
        Ok(true)
    }

    // =========================================================================
    // Compaction / Export
    // =========================================================================

    /// Copy every live entry into a fresh store over `target`
    ///
    /// `target` must be empty. Ids are carried over unchanged; the source is
    /// flushed first and otherwise left untouched.
    pub fn compact_into<T: Backend>(&mut self, target: T) -> Result<FileDb<T>> {
        self.flush()?;

        let config = Config {
            access_mode: AccessMode::ReadWrite,
            create_if_missing: true,
            ..self.config.clone()
        };
        let mut compacted = FileDb::from_backend(target, config)?;
        if compacted.header().last_page_id != 0 {
            return Err(FileDbError::Config(
                "compaction target must be empty".to_string(),
            ));
        }

        let nodes = self.file.list_nodes()?;
        for node in &nodes {
            let first = chain_head(node)?;
            let mut reader = self.file.open_chain(first)?;
            compacted.insert_blob(node.id, &node.file_name, &node.file_extension, &mut reader)?;
        }
        compacted.flush()?;

        debug!(entries = nodes.len(), "compacted entries");
        Ok(compacted)
    }

    /// Write every live entry to its own file in `directory`
    ///
    /// `pattern` may use `{id}`, `{filename}` and `{extension}`; trailing
    /// dots left by an empty extension are dropped. Fails with
    /// `ExportCollision` before writing anything if two entries render to
    /// the same path.
    pub fn export(&mut self, directory: impl AsRef<Path>, pattern: &str) -> Result<Vec<PathBuf>> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;

        // resolve every target first so a collision writes nothing
        let mut targets = Vec::new();
        let mut seen = HashSet::new();
        for entry in self.list_files()? {
            let path = directory.join(render_export_name(pattern, &entry));
            if !seen.insert(path.clone()) {
                return Err(FileDbError::ExportCollision(path));
            }
            targets.push((entry, path));
        }

        let mut written = Vec::new();
        for (entry, path) in targets {
            let mut out = BufWriter::new(File::create(&path)?);
            self.read(entry.id, &mut out)?;
            out.flush()?;
            written.push(path);
        }

        info!(directory = %directory.display(), files = written.len(), "exported entries");
        Ok(written)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Layout counters; walks the index pages and the free list
    pub fn stats(&mut self) -> Result<StoreStats> {
        let index_pages = self.file.index_page_ids()?.len();
        let nodes = self.file.all_nodes()?;
        let live_entries = nodes.iter().filter(|n| !n.is_deleted).count();
        let free_data_pages = self.file.free_page_ids()?.len();

        Ok(StoreStats {
            last_page_id: self.header().last_page_id,
            index_pages,
            live_entries,
            deleted_entries: nodes.len().saturating_sub(live_entries + 1),
            free_data_pages,
            cached_index_pages: self.file.cache().len(),
        })
    }

    /// Data page ids holding the blob `id`, in chain order
    pub fn chain_pages(&mut self, id: Uuid) -> Result<Option<Vec<PageId>>> {
        let Some(node) = self.find_live(id)? else {
            return Ok(None);
        };
        let first = chain_head(&node)?;
        self.file.chain_page_ids(first).map(Some)
    }

    /// Data page ids on the free list, in reuse order
    pub fn free_pages(&mut self) -> Result<Vec<PageId>> {
        self.file.free_page_ids()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Write dirty index pages and the header
    pub fn flush(&mut self) -> Result<()> {
        if self.config.is_read_only() {
            return Ok(());
        }
        self.file.flush(self.config.sync_on_flush)
    }

    /// Flush and release the backend
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        info!("closed database");
        Ok(())
    }

    /// Release the backend without flushing
    ///
    /// Index changes since the last flush are lost, as after a crash.
    pub fn into_backend(self) -> S {
        if self.file.has_unflushed_changes() {
            warn!("dropping database with unflushed index changes");
        }
        self.file.into_inner()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// In-memory header (may be ahead of the on-disk copy)
    pub fn header(&self) -> &Header {
        self.file.header()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of index pages currently cached
    pub fn cached_index_pages(&self) -> usize {
        self.file.cache().len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn find_live(&mut self, id: Uuid) -> Result<Option<IndexNode>> {
        let Some(addr) = self.file.search(id)? else {
            return Ok(None);
        };
        let node = self.file.node(addr)?;
        Ok((!node.is_deleted).then(|| node.clone()))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.is_read_only() {
            return Err(FileDbError::ReadOnly);
        }
        Ok(())
    }
}

fn chain_head(node: &IndexNode) -> Result<PageId> {
    node.data_page_id.ok_or_else(|| {
        FileDbError::Corrupted(format!("live entry {} has no data chain", node.id))
    })
}

fn shrink_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".shrink");
    PathBuf::from(name)
}

/// Substitute `{id}`, `{filename}` and `{extension}` in an export pattern
pub fn render_export_name(pattern: &str, entry: &Entry) -> String {
    let rendered = pattern
        .replace("{id}", &entry.id.to_string())
        .replace("{filename}", &entry.file_name)
        .replace("{extension}", &entry.file_extension);
    rendered.trim_end_matches('.').to_string()
}
