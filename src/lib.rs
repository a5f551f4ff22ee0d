//! # FileDB
//!
//! An embedded blob store that keeps many files inside one paged file:
//! - Content-addressed 128-bit ids (SHA-256 of payload, name and length)
//! - Unbalanced BST index in an arena of index pages
//! - Payloads as singly linked chains of data pages
//! - FIFO free list for data page reuse
//! - Out-of-place compaction (`shrink`)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         FileDb                               │
//! │      store / read / delete / list / shrink / export          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Index (BST) │          │ Data Chains │
//!   │ IndexCache  │          │  Free List  │
//!   └──────┬──────┘          └──────┬──────┘
//!          │   flush only           │   write-through
//!          └────────────┬───────────┘
//!                       ▼
//!                ┌─────────────┐
//!                │    Pager    │
//!                │ (Header +   │
//!                │  4K pages)  │
//!                └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use filedb::{Config, FileDb};
//!
//! # fn main() -> filedb::Result<()> {
//! let mut db = FileDb::open(Config::builder().path("photos.filedb").build())?;
//! let entry = db.store_bytes("cat.png", b"...")?;
//! let bytes = db.read_to_vec(entry.id)?;
//! assert!(bytes.is_some());
//! db.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod entry;
pub mod identifier;
pub mod mime;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FileDbError, Result};
pub use config::{AccessMode, Config};
pub use engine::{FileDb, ShrinkReport, StoreStats, DEFAULT_EXPORT_PATTERN};
pub use entry::Entry;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FileDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
