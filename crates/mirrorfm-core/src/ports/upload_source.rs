//! Upload source ports
//!
//! Uploads arrive from heterogeneous places: plain file handles, the result
//! of an "open file" dialog, or a drag-and-drop of whole directory trees.
//! These traits describe the capabilities the upload coordinator needs
//! from each of them.

use std::sync::Arc;

use bytes::Bytes;

use crate::domain::FmError;

/// A readable file to be uploaded
#[async_trait::async_trait]
pub trait IByteSource: Send + Sync {
    /// File name (last segment)
    fn name(&self) -> &str;

    /// Path relative to the upload target, including the file name
    ///
    /// `None` (or a path without `/`) places the file directly in the
    /// target directory.
    fn relative_path(&self) -> Option<&str> {
        None
    }

    /// Reads the whole content
    async fn read(&self) -> Result<Bytes, FmError>;
}

/// One node of a dropped hierarchy (file or directory)
#[async_trait::async_trait]
pub trait IDroppedEntry: Send + Sync {
    fn name(&self) -> &str;

    fn is_file(&self) -> bool;

    fn is_directory(&self) -> bool;

    /// Lists a directory entry's children
    async fn read_entries(&self) -> Result<Vec<Arc<dyn IDroppedEntry>>, FmError>;

    /// Reads a file entry's content
    async fn read_bytes(&self) -> Result<Bytes, FmError>;
}

/// A dropped file re-addressed by its path inside the drop
pub(crate) struct DroppedFile {
    relative_path: String,
    entry: Arc<dyn IDroppedEntry>,
}

impl DroppedFile {
    pub(crate) fn new(relative_path: String, entry: Arc<dyn IDroppedEntry>) -> Self {
        Self {
            relative_path,
            entry,
        }
    }
}

#[async_trait::async_trait]
impl IByteSource for DroppedFile {
    fn name(&self) -> &str {
        self.entry.name()
    }

    fn relative_path(&self) -> Option<&str> {
        Some(&self.relative_path)
    }

    async fn read(&self) -> Result<Bytes, FmError> {
        self.entry.read_bytes().await
    }
}

/// An in-memory file, handy for synthesized uploads and tests
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    relative_path: Option<String>,
    data: Bytes,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            relative_path: None,
            data: data.into(),
        }
    }

    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = Some(relative_path.into());
        self
    }
}

#[async_trait::async_trait]
impl IByteSource for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn relative_path(&self) -> Option<&str> {
        self.relative_path.as_deref()
    }

    async fn read(&self) -> Result<Bytes, FmError> {
        Ok(self.data.clone())
    }
}
