//! [`IRemoteStore`] over the signed HTTP protocol
//!
//! Maps each port operation onto one backend action and translates the
//! wire DTOs into port DTOs.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use mirrorfm_core::config::Config;
use mirrorfm_core::domain::{EntryType, FmError};
use mirrorfm_core::ports::{
    EntryDescriptor, IAuthChallenge, IRemoteStore, ProgressFn, RenamePair,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::secret::KeyringSecretStore;
use crate::transport::SignedTransport;
use crate::upload::{self, DEFAULT_CHUNK_SIZE};

// ============================================================================
// Wire types
// ============================================================================

/// One entry of an `slist` or `stat` response
#[derive(Debug, Deserialize)]
struct WireEntry {
    name: String,
    #[serde(rename = "type")]
    entry_type: EntryType,
    #[serde(default)]
    size: u64,
    /// Unix seconds
    #[serde(default)]
    ctime: Option<i64>,
}

impl From<WireEntry> for EntryDescriptor {
    fn from(entry: WireEntry) -> Self {
        let size = match entry.entry_type {
            EntryType::File => entry.size,
            EntryType::Dir => 0,
        };
        EntryDescriptor {
            name: entry.name,
            entry_type: entry.entry_type,
            size,
            created: entry
                .ctime
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        }
    }
}

#[derive(Debug, Serialize)]
struct PathRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct FilesRequest<'a> {
    files: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<u32>,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    files: &'a [String],
    to: &'a str,
}

#[derive(Debug, Serialize)]
struct RenameRequest<'a> {
    files: BTreeMap<&'a str, &'a str>,
}

// ============================================================================
// HttpRemoteStore
// ============================================================================

/// The backend reached through a [`SignedTransport`]
pub struct HttpRemoteStore {
    transport: Arc<SignedTransport>,
    chunk_size: usize,
}

impl HttpRemoteStore {
    pub fn new(transport: Arc<SignedTransport>) -> Self {
        Self {
            transport,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Builds the transport and store described by `config`
    ///
    /// The keyring secret store is attached only when `auth.persist_secret`
    /// is set.
    pub fn from_config(
        config: &Config,
        challenge: Option<Arc<dyn IAuthChallenge>>,
    ) -> anyhow::Result<Self> {
        let mut transport = SignedTransport::from_config(&config.server)?;
        if let Some(challenge) = challenge {
            transport = transport.with_challenge(challenge);
        }
        if config.auth.persist_secret {
            transport =
                transport.with_secret_store(Arc::new(KeyringSecretStore::from_config(&config.auth)));
        }
        let chunk_size = usize::try_from(config.upload.chunk_size_kb.saturating_mul(1024))
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        Ok(Self::new(Arc::new(transport)).with_chunk_size(chunk_size))
    }

    /// Sets the body chunk size used for upload progress
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn transport(&self) -> &Arc<SignedTransport> {
        &self.transport
    }

    async fn mutate<T: Serialize + ?Sized>(&self, action: &str, payload: &T) -> Result<(), FmError> {
        let reply = self.transport.call_text(action, payload).await?;
        debug!(action, reply = %reply.trim(), "Mutation accepted");
        Ok(())
    }
}

#[async_trait]
impl IRemoteStore for HttpRemoteStore {
    async fn list_names(&self, path: &str) -> Result<Vec<String>, FmError> {
        self.transport.call_json("list", &PathRequest { path }).await
    }

    async fn list_detailed(&self, path: &str) -> Result<Vec<EntryDescriptor>, FmError> {
        let entries: Vec<WireEntry> = self.transport.call_json("slist", &PathRequest { path }).await?;
        Ok(entries.into_iter().map(EntryDescriptor::from).collect())
    }

    async fn stat(&self, path: &str) -> Result<EntryDescriptor, FmError> {
        let entry: WireEntry = self.transport.call_json("stat", &PathRequest { path }).await?;
        Ok(entry.into())
    }

    async fn delete(&self, paths: &[String]) -> Result<(), FmError> {
        self.mutate("delete", &FilesRequest { files: paths, mode: None })
            .await
    }

    async fn mkdir(&self, paths: &[String], mode: Option<u32>) -> Result<(), FmError> {
        self.mutate("mkdir", &FilesRequest { files: paths, mode })
            .await
    }

    async fn touch(&self, paths: &[String]) -> Result<(), FmError> {
        self.mutate("touch", &FilesRequest { files: paths, mode: None })
            .await
    }

    async fn copy(&self, sources: &[String], destination: &str) -> Result<(), FmError> {
        self.mutate(
            "copy",
            &TransferRequest {
                files: sources,
                to: destination,
            },
        )
        .await
    }

    async fn move_to(
        &self,
        sources: &[String],
        destination: &str,
        deep: bool,
    ) -> Result<(), FmError> {
        let action = if deep { "fmove" } else { "move" };
        self.mutate(
            action,
            &TransferRequest {
                files: sources,
                to: destination,
            },
        )
        .await
    }

    async fn rename(&self, pairs: &[RenamePair]) -> Result<(), FmError> {
        let files = pairs
            .iter()
            .map(|p| (p.from.as_str(), p.to.as_str()))
            .collect();
        self.mutate("rename", &RenameRequest { files }).await
    }

    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<(), FmError> {
        upload::upload(&self.transport, path, data, self.chunk_size, progress).await
    }
}
