//! Error types for FileDB
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using FileDbError
pub type Result<T> = std::result::Result<T, FileDbError>;

/// Unified error type for FileDB operations
#[derive(Debug, Error)]
pub enum FileDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database file not found: {}", .0.display())]
    NotFound(PathBuf),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u16),

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(Uuid),

    // -------------------------------------------------------------------------
    // Consistency Errors (file corruption or logic defect, never repaired)
    // -------------------------------------------------------------------------
    #[error("Free list invariant violated: {0}")]
    FreeListInvariantViolation(String),

    #[error("Data page {0} was expected to be empty")]
    NonEmptyPageExpectedEmpty(u32),

    #[error("Corrupted file: {0}")]
    Corrupted(String),

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("Payload too large: {0} bytes (max {max})", max = u32::MAX)]
    PayloadTooLarge(u64),

    #[error("Database was opened read-only")]
    ReadOnly,

    #[error("Export would write two entries to {}", .0.display())]
    ExportCollision(PathBuf),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<FileDbError> for std::io::Error {
    fn from(err: FileDbError) -> Self {
        match err {
            FileDbError::Io(e) => e,
            FileDbError::UnsupportedOperation(_) => {
                std::io::Error::new(std::io::ErrorKind::Unsupported, err)
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
