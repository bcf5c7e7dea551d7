//! Local-disk upload sources
//!
//! Implements the upload-source ports over `tokio::fs` so whole folders
//! can be uploaded without a browser.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::domain::FmError;
use crate::ports::{IByteSource, IDroppedEntry};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// A file on the local disk, uploaded under its own name
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
    name: String,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = file_name(&path);
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl IByteSource for LocalFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> Result<Bytes, FmError> {
        let data = tokio::fs::read(&self.path).await?;
        Ok(Bytes::from(data))
    }
}

/// A file or directory on the local disk, seen as a drop entry
#[derive(Debug, Clone)]
pub struct LocalDropEntry {
    path: PathBuf,
    name: String,
    is_dir: bool,
}

impl LocalDropEntry {
    /// Inspects `path`, which must exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, FmError> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        Ok(Self {
            name: file_name(&path),
            is_dir: metadata.is_dir(),
            path,
        })
    }
}

#[async_trait::async_trait]
impl IDroppedEntry for LocalDropEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_file(&self) -> bool {
        !self.is_dir
    }

    fn is_directory(&self) -> bool {
        self.is_dir
    }

    /// Children sorted by name; entries that are neither files nor
    /// directories (sockets, broken links) are skipped
    async fn read_entries(&self) -> Result<Vec<Arc<dyn IDroppedEntry>>, FmError> {
        if !self.is_dir {
            return Err(FmError::NotADirectory(self.path.display().to_string()));
        }
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(m) => m,
                Err(err) => {
                    debug!(path = ?entry.path(), %err, "Skipping unreadable drop entry");
                    continue;
                }
            };
            if !metadata.is_dir() && !metadata.is_file() {
                continue;
            }
            children.push(LocalDropEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: metadata.is_dir(),
                path: entry.path(),
            });
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children
            .into_iter()
            .map(|c| Arc::new(c) as Arc<dyn IDroppedEntry>)
            .collect())
    }

    async fn read_bytes(&self) -> Result<Bytes, FmError> {
        if self.is_dir {
            return Err(FmError::IsADirectory(self.path.display().to_string()));
        }
        let data = tokio::fs::read(&self.path).await?;
        Ok(Bytes::from(data))
    }
}
