//! Caller-facing view of a stored blob

use std::path::Path;

use uuid::Uuid;

use crate::mime::mime_type_for;
use crate::storage::IndexNode;

/// Metadata of one stored blob, derived from its index node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: Uuid,
    /// Base name, without extension
    pub file_name: String,
    /// Extension, without the dot
    pub file_extension: String,
    pub file_length: u32,
    pub mime_type: &'static str,
}

impl Entry {
    pub fn from_node(node: &IndexNode) -> Self {
        Self {
            id: node.id,
            file_name: node.file_name.clone(),
            file_extension: node.file_extension.clone(),
            file_length: node.file_length,
            mime_type: mime_type_for(&node.file_extension),
        }
    }

    /// `name.ext`, or just `name` when there is no extension
    pub fn full_name(&self) -> String {
        if self.file_extension.is_empty() {
            self.file_name.clone()
        } else {
            format!("{}.{}", self.file_name, self.file_extension)
        }
    }
}

/// Split a logical name into (base name, extension)
///
/// Only the final path component is kept: `"dir/photo.jpg"` → `("photo", "jpg")`.
pub fn split_name(name: &str) -> (String, String) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (stem, extension)
}
