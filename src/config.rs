//! Configuration for FileDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{FileDbError, Result};

/// Main configuration for a FileDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Path of the single database file
    pub path: PathBuf,

    /// Whether the file is opened for writing
    pub access_mode: AccessMode,

    /// Initialize a new file when `path` does not exist
    pub create_if_missing: bool,

    // -------------------------------------------------------------------------
    // Index Cache Configuration
    // -------------------------------------------------------------------------
    /// Max number of index pages kept in memory before eviction
    pub cache_capacity: usize,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// fsync the file after each explicit flush
    pub sync_on_flush: bool,
}

/// How the database file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Reads and mutations allowed
    ReadWrite,

    /// Store/delete/shrink fail with `ReadOnly`
    ReadOnly,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./storage.filedb"),
            access_mode: AccessMode::ReadWrite,
            create_if_missing: true,
            cache_capacity: 200,
            sync_on_flush: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check values that cannot be expressed through the type system
    pub fn validate(&self) -> Result<()> {
        // the root page is pinned, so at least one more slot is needed for eviction to work
        if self.cache_capacity < 2 {
            return Err(FileDbError::Config(format!(
                "cache_capacity must be at least 2, got {}",
                self.cache_capacity
            )));
        }
        if self.access_mode == AccessMode::ReadOnly && self.create_if_missing {
            return Err(FileDbError::Config(
                "create_if_missing requires read-write access".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_read_only(&self) -> bool {
        self.access_mode == AccessMode::ReadOnly
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the access mode
    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.config.access_mode = mode;
        if mode == AccessMode::ReadOnly {
            self.config.create_if_missing = false;
        }
        self
    }

    /// Shorthand for `access_mode(AccessMode::ReadOnly)`
    pub fn read_only(self) -> Self {
        self.access_mode(AccessMode::ReadOnly)
    }

    /// Set whether a missing file is created on open
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Set the index page cache capacity (in pages)
    pub fn cache_capacity(mut self, pages: usize) -> Self {
        self.config.cache_capacity = pages;
        self
    }

    /// Set whether flush calls fsync
    pub fn sync_on_flush(mut self, sync: bool) -> Self {
        self.config.sync_on_flush = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
