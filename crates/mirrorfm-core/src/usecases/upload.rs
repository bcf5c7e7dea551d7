//! Upload use case
//!
//! Normalizes every kind of upload source into a flat list of files
//! addressed by their path relative to the target directory, recreates the
//! folder structure remotely, and uploads each file with progress written
//! into its node.
//!
//! Collisions are checked before any transfer:
//! - colliding with a directory fails the item
//! - colliding with a file defers the item until one batched confirmation
//! - otherwise a placeholder node is inserted and the file uploaded at once
//!
//! Item failures never abort the batch; they are collected in the
//! returned [`UploadReport`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::domain::{path, FmError, NodeId, NodeKind};
use crate::ports::upload_source::DroppedFile;
use crate::ports::{
    EntryDescriptor, IByteSource, IConfirmPrompt, IDroppedEntry, IFilePicker, ProgressFn,
};
use crate::sources::LocalFileSource;
use crate::tree::cache::absolute;
use crate::tree::TreeCache;

/// Where the files of an upload batch come from
pub enum UploadSource {
    /// Already opened file handles
    Files(Vec<Arc<dyn IByteSource>>),
    /// An "open file" dialog, shown when the batch starts
    Picker(Arc<dyn IFilePicker>),
    /// The top-level entries of a drag-and-drop
    Drop(Vec<Arc<dyn IDroppedEntry>>),
}

/// Summary of an upload batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UploadReport {
    /// Remote paths written successfully
    pub uploaded: Vec<String>,
    /// Colliding paths the user chose not to overwrite
    pub skipped: Vec<String>,
    /// Remote path (or drop path) and the error that stopped it
    pub failures: Vec<(String, FmError)>,
}

impl UploadReport {
    /// True when every item of the batch was uploaded
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failures.is_empty()
    }

    fn fail(&mut self, target: String, err: FmError) {
        warn!(path = %target, error = %err, "Upload item failed");
        self.failures.push((target, err));
    }
}

/// A file waiting for transfer, with its resolved destination
struct Pending {
    remote_path: String,
    node: NodeId,
    source: Arc<dyn IByteSource>,
    placeholder: bool,
}

/// A flattened upload batch
#[derive(Default)]
struct Batch {
    files: Vec<Arc<dyn IByteSource>>,
    /// Relative paths of dropped directories, parents first
    directories: Vec<String>,
}

/// Drives uploads into the mirrored tree
pub struct UploadCoordinator {
    cache: Arc<TreeCache>,
    confirm: Arc<dyn IConfirmPrompt>,
    confirm_overwrite: bool,
}

impl UploadCoordinator {
    pub fn new(cache: Arc<TreeCache>, confirm: Arc<dyn IConfirmPrompt>) -> Self {
        Self {
            cache,
            confirm,
            confirm_overwrite: true,
        }
    }

    /// Creates a coordinator honouring the `upload` configuration section
    pub fn from_config(
        cache: Arc<TreeCache>,
        confirm: Arc<dyn IConfirmPrompt>,
        config: &UploadConfig,
    ) -> Self {
        Self::new(cache, confirm).with_confirm_overwrite(config.confirm_overwrite)
    }

    /// When disabled, colliding files are overwritten without a prompt
    pub fn with_confirm_overwrite(mut self, confirm_overwrite: bool) -> Self {
        self.confirm_overwrite = confirm_overwrite;
        self
    }

    /// Uploads a batch into the directory at `target`
    ///
    /// Fails as a whole only if the target cannot be resolved to a
    /// directory or the file picker is cancelled; everything else is
    /// reported per item.
    pub async fn upload(
        &self,
        target: &str,
        source: UploadSource,
    ) -> Result<UploadReport, FmError> {
        let target = path::as_dir(&absolute(target));
        let mut report = UploadReport::default();

        let batch = self.collect(source, &mut report).await?;
        self.cache.resolve_dir(&target).await?;
        info!(
            target = %target,
            files = batch.files.len(),
            directories = batch.directories.len(),
            "Starting upload batch"
        );

        for dir in &batch.directories {
            if let Err(e) = self.ensure_directory(&target, &path::segments(dir)).await {
                report.fail(path::child_path(&target, dir, true), e);
            }
        }

        let mut repeated = Vec::new();
        for file in batch.files {
            match self.prepare(&target, file).await {
                Ok(pending) if pending.placeholder => self.transfer(pending, &mut report).await,
                Ok(pending) => repeated.push(pending),
                Err((remote_path, e)) => report.fail(remote_path, e),
            }
        }

        if !repeated.is_empty() {
            let paths: Vec<String> = repeated.iter().map(|p| p.remote_path.clone()).collect();
            let proceed = !self.confirm_overwrite || self.confirm.confirm_overwrite(&paths).await;
            if proceed {
                for pending in repeated {
                    self.transfer(pending, &mut report).await;
                }
            } else {
                info!(count = paths.len(), "Overwrite declined, skipping colliding files");
                report.skipped.extend(paths);
            }
        }

        info!(
            target = %target,
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Upload batch finished"
        );
        Ok(report)
    }

    // ========================================================================
    // Normalization
    // ========================================================================

    async fn collect(
        &self,
        source: UploadSource,
        report: &mut UploadReport,
    ) -> Result<Batch, FmError> {
        match source {
            UploadSource::Files(files) => Ok(Batch {
                files,
                directories: Vec::new(),
            }),
            UploadSource::Picker(picker) => {
                let picked = picker
                    .pick_files()
                    .await
                    .ok_or_else(|| FmError::UserAborted("file picker cancelled".to_string()))?;
                let files = picked
                    .into_iter()
                    .map(|p| Arc::new(LocalFileSource::new(p)) as Arc<dyn IByteSource>)
                    .collect();
                Ok(Batch {
                    files,
                    directories: Vec::new(),
                })
            }
            UploadSource::Drop(entries) => Ok(expand_drop(entries, report).await),
        }
    }

    // ========================================================================
    // Destination resolution
    // ========================================================================

    /// Walks `segments` below `base`, creating missing directories remotely
    async fn ensure_directory(&self, base: &str, segments: &[String]) -> Result<NodeId, FmError> {
        let mut current = self.cache.resolve_dir(base).await?;
        for segment in segments {
            self.cache.ensure_loaded(current).await?;
            let existing = self.cache.read(|t| {
                t.find_child(current, segment)
                    .and_then(|id| t.get(id))
                    .map(|n| (n.id(), n.is_dir(), n.path().to_string()))
            });
            current = match existing {
                Some((id, true, _)) => id,
                Some((_, false, file_path)) => return Err(FmError::NotADirectory(file_path)),
                None => {
                    let dir_path = self
                        .cache
                        .node(current)
                        .map(|n| path::child_path(n.path(), segment, true))
                        .ok_or_else(|| FmError::NotFound(format!("node {current}")))?;
                    debug!(path = %dir_path, "Creating upload directory");
                    self.cache
                        .store()
                        .mkdir(std::slice::from_ref(&dir_path), None)
                        .await?;
                    self.cache
                        .insert_entry(current, &EntryDescriptor::dir(segment.clone()), true)
                        .ok_or(FmError::NotFound(dir_path))?
                }
            };
        }
        Ok(current)
    }

    /// Resolves a file's destination and checks it for collisions
    ///
    /// Non-colliding files get a placeholder node right away. Errors carry
    /// the remote path the file was headed for.
    async fn prepare(
        &self,
        target: &str,
        source: Arc<dyn IByteSource>,
    ) -> Result<Pending, (String, FmError)> {
        let relative = source
            .relative_path()
            .map(path::segments)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| vec![source.name().to_string()]);
        let (name, dirs) = match relative.split_last() {
            Some((name, dirs)) => (name.clone(), dirs.to_vec()),
            None => (source.name().to_string(), Vec::new()),
        };
        let intended = path::normalize(&format!("{target}{}", relative.join("/")));

        let dir = self
            .ensure_directory(target, &dirs)
            .await
            .map_err(|e| (intended.clone(), e))?;
        let existing = self.cache.read(|t| {
            t.find_child(dir, &name)
                .and_then(|id| t.get(id))
                .map(|n| (n.id(), n.is_dir(), n.path().to_string()))
        });

        match existing {
            Some((_, true, dir_path)) => Err((intended, FmError::IsADirectory(dir_path))),
            Some((id, false, remote_path)) => Ok(Pending {
                remote_path,
                node: id,
                source,
                placeholder: false,
            }),
            None => {
                let node = self
                    .cache
                    .insert_entry(dir, &EntryDescriptor::file(name, 0), false)
                    .ok_or_else(|| (intended.clone(), FmError::NotFound(intended.clone())))?;
                let remote_path = self.cache.write(|t| {
                    t.get_mut(node).map(|n| {
                        n.upload_progress = Some(0.0);
                        n.path().to_string()
                    })
                });
                Ok(Pending {
                    remote_path: remote_path.unwrap_or(intended),
                    node,
                    source,
                    placeholder: true,
                })
            }
        }
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    async fn transfer(&self, pending: Pending, report: &mut UploadReport) {
        let Pending {
            remote_path,
            node,
            source,
            placeholder,
        } = pending;

        self.cache.write(|t| {
            if let Some(n) = t.get_mut(node) {
                n.upload_progress = Some(0.0);
            }
        });

        let result = match source.read().await {
            Ok(data) => {
                let size = data.len() as u64;
                debug!(path = %remote_path, size, "Uploading file");
                self.cache
                    .store()
                    .upload(&remote_path, data, Some(self.progress_for(node)))
                    .await
                    .map(|()| size)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(size) => {
                self.cache.write(|t| {
                    if let Some(n) = t.get_mut(node) {
                        n.upload_progress = None;
                        n.kind = NodeKind::File { size };
                    }
                });
                report.uploaded.push(remote_path);
            }
            Err(e) => {
                self.cache.write(|t| {
                    if placeholder {
                        t.remove_subtree(node);
                    } else if let Some(n) = t.get_mut(node) {
                        n.upload_progress = None;
                    }
                });
                report.fail(remote_path, e);
            }
        }
    }

    fn progress_for(&self, node: NodeId) -> ProgressFn {
        let cache = Arc::clone(&self.cache);
        Box::new(move |sent, total| {
            cache.write(|t| {
                if let Some(n) = t.get_mut(node) {
                    if n.upload_progress.is_some() {
                        n.upload_progress = Some(percent(sent, total));
                    }
                }
            });
        })
    }
}

fn percent(sent: u64, total: u64) -> f32 {
    if total == 0 {
        return 100.0;
    }
    (sent.min(total) as f64 * 100.0 / total as f64) as f32
}

/// Flattens a drop into files addressed by their path inside the drop
///
/// A directory that cannot be listed is reported and its subtree skipped.
async fn expand_drop(entries: Vec<Arc<dyn IDroppedEntry>>, report: &mut UploadReport) -> Batch {
    let mut batch = Batch::default();
    let mut stack: Vec<(String, Arc<dyn IDroppedEntry>)> = entries
        .into_iter()
        .rev()
        .map(|e| (e.name().to_string(), e))
        .collect();

    while let Some((relative, entry)) = stack.pop() {
        if entry.is_file() {
            batch
                .files
                .push(Arc::new(DroppedFile::new(relative, entry)) as Arc<dyn IByteSource>);
        } else if entry.is_directory() {
            match entry.read_entries().await {
                Ok(children) => {
                    for child in children.into_iter().rev() {
                        let child_path = format!("{relative}/{}", child.name());
                        stack.push((child_path, child));
                    }
                    batch.directories.push(relative);
                }
                Err(e) => report.fail(relative, e),
            }
        }
    }
    batch
}
