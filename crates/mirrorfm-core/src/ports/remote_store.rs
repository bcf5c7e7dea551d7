//! Remote store port (driven/secondary port)
//!
//! This module defines the interface to the backend that owns the real
//! file namespace. The primary implementation speaks the signed HTTP
//! protocol in `mirrorfm-http`, but the tree cache and use cases only see
//! this trait, which keeps them testable against an in-memory store.
//!
//! ## Design Notes
//!
//! - Uses [`FmError`] instead of `anyhow::Result`: callers must tell an
//!   authentication failure from a missing path or a forbidden operation.
//! - Mutations are batch calls. The backend applies a batch atomically (or
//!   the client treats it so): an `Err` means nothing changed.
//! - The `progress` callback in `upload` is called with
//!   `(bytes_sent, total_bytes)`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EntryType, FmError};

/// Progress callback reporting `(bytes_sent, total_bytes)`
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

// ============================================================================
// EntryDescriptor
// ============================================================================

/// A single entry of a detailed listing or a stat call
///
/// This is a port-level DTO. The tree cache converts descriptors into
/// [`Node`](crate::domain::Node)s and attaches them to their parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDescriptor {
    /// Last path segment (never contains `/`)
    pub name: String,
    /// File or directory
    pub entry_type: EntryType,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Creation time as reported by the server
    pub created: Option<DateTime<Utc>>,
}

impl EntryDescriptor {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            entry_type: EntryType::File,
            size,
            created: None,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_type: EntryType::Dir,
            size: 0,
            created: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Dir
    }
}

/// One `from -> to` entry of a rename batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePair {
    pub from: String,
    pub to: String,
}

impl RenamePair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the backend holding the authoritative namespace
///
/// Paths passed in are absolute and normalized; directory paths may carry a
/// trailing `/`.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Lists the bare names under `path` (directories end with `/`)
    async fn list_names(&self, path: &str) -> Result<Vec<String>, FmError>;

    /// Lists the entries under `path` with type, size and creation time
    async fn list_detailed(&self, path: &str) -> Result<Vec<EntryDescriptor>, FmError>;

    /// Reads the metadata of a single entry
    async fn stat(&self, path: &str) -> Result<EntryDescriptor, FmError>;

    /// Deletes every path in the batch
    async fn delete(&self, paths: &[String]) -> Result<(), FmError>;

    /// Creates directories, with an optional octal permission mode
    async fn mkdir(&self, paths: &[String], mode: Option<u32>) -> Result<(), FmError>;

    /// Creates empty files
    async fn touch(&self, paths: &[String]) -> Result<(), FmError>;

    /// Copies every source into the `destination` directory
    async fn copy(&self, sources: &[String], destination: &str) -> Result<(), FmError>;

    /// Moves every source into the `destination` directory
    ///
    /// With `deep` set the backend merges colliding directories instead of
    /// rejecting them.
    async fn move_to(
        &self,
        sources: &[String],
        destination: &str,
        deep: bool,
    ) -> Result<(), FmError>;

    /// Applies an explicit `from -> to` mapping
    async fn rename(&self, pairs: &[RenamePair]) -> Result<(), FmError>;

    /// Uploads `data` to `path`, overwriting any existing file
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<(), FmError>;
}
