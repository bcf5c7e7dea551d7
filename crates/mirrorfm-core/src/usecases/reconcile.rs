//! Mutation reconciliation use case
//!
//! Every mutation runs in two phases: the remote call first, then an
//! equivalent local edit of the mirror so the tree reflects the new remote
//! state without a full reload. If the remote call fails the tree is left
//! exactly as it was.
//!
//! Name collisions follow the backend's rules: files are replaced (last
//! write wins) and directories are merged recursively.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{path, FmError, NodeId};
use crate::ports::{EntryDescriptor, IRemoteStore, RenamePair};
use crate::tree::cache::absolute;
use crate::tree::{Tree, TreeCache};

/// Options for copy and move batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Ask the backend to merge colliding directories (`fmove`)
    pub deep: bool,
    /// Mark the placed nodes as active in the destination
    pub highlight: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            deep: false,
            highlight: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Copy,
    Move,
}

/// Applies remote mutations and mirrors their result locally
pub struct MutationReconciler {
    cache: Arc<TreeCache>,
}

impl MutationReconciler {
    pub fn new(cache: Arc<TreeCache>) -> Self {
        Self { cache }
    }

    fn store(&self) -> &Arc<dyn IRemoteStore> {
        self.cache.store()
    }

    /// Finds the node at `target` after a remote mutation
    ///
    /// Fetching the parent listing may already reflect the mutation, in
    /// which case the node is legitimately absent.
    async fn locate(&self, target: &str) -> Result<Option<NodeId>, FmError> {
        let parts = path::split(target);
        let parent = match self.cache.resolve_dir(&parts.dir).await {
            Ok(id) => id,
            Err(FmError::NotFound(_)) | Err(FmError::NotADirectory(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(self.cache.read(|t| t.find_child(parent, &parts.full_name)))
    }

    /// Mirrors an entry that arrived in `dir` from a source the tree never held
    ///
    /// The entry's metadata is read back from the store. A same-named loaded
    /// directory is invalidated instead of replaced, since the backend
    /// merged into it. Returns the node and whether it collided.
    async fn adopt(&self, dir: NodeId, name: &str) -> Result<Option<(NodeId, bool)>, FmError> {
        let Some(dir_path) = self.cache.node(dir).map(|n| n.path().to_string()) else {
            return Ok(None);
        };
        let target = path::child_path(&dir_path, name, false);
        let entry = match self.store().stat(&target).await {
            Ok(entry) => EntryDescriptor {
                name: name.to_string(),
                ..entry
            },
            Err(FmError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let existing = self.cache.read(|t| {
            t.find_child(dir, name)
                .map(|id| (id, t.get(id).is_some_and(|n| n.is_dir())))
        });
        match existing {
            Some((id, true)) if entry.is_dir() => {
                self.cache.write(|t| t.invalidate(id));
                Ok(Some((id, true)))
            }
            Some(_) => Ok(self.cache.insert_entry(dir, &entry, false).map(|id| (id, true))),
            None => Ok(self.cache.insert_entry(dir, &entry, false).map(|id| (id, false))),
        }
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Deletes every path remotely, then detaches the nodes locally
    pub async fn delete(&self, paths: &[String]) -> Result<(), FmError> {
        let paths: Vec<String> = paths.iter().map(|p| absolute(p)).collect();
        if paths.is_empty() {
            return Ok(());
        }
        self.store().delete(&paths).await?;

        for target in &paths {
            match self.locate(target).await? {
                Some(id) => self.cache.write(|t| t.remove_subtree(id)),
                None => debug!(path = %target, "Deleted path was not mirrored"),
            }
        }
        info!(count = paths.len(), "Deleted entries");
        Ok(())
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Creates directories remotely and inserts empty directory nodes
    pub async fn make_directories(
        &self,
        paths: &[String],
        mode: Option<u32>,
    ) -> Result<Vec<NodeId>, FmError> {
        let paths: Vec<String> = paths.iter().map(|p| path::as_dir(&absolute(p))).collect();
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        self.store().mkdir(&paths, mode).await?;
        self.insert_created(&paths, true).await
    }

    /// Creates empty files remotely and inserts zero-size file nodes
    pub async fn touch(&self, paths: &[String]) -> Result<Vec<NodeId>, FmError> {
        let paths: Vec<String> = paths.iter().map(|p| path::trim_dir(&absolute(p))).collect();
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        self.store().touch(&paths).await?;
        self.insert_created(&paths, false).await
    }

    async fn insert_created(&self, paths: &[String], dirs: bool) -> Result<Vec<NodeId>, FmError> {
        let mut created = Vec::with_capacity(paths.len());
        for target in paths {
            let parts = path::split(target);
            let parent = self.cache.resolve_dir(&parts.dir).await?;
            let entry = if dirs {
                EntryDescriptor::dir(parts.full_name)
            } else {
                EntryDescriptor::file(parts.full_name, 0)
            };
            if let Some(id) = self.cache.insert_entry(parent, &entry, dirs) {
                created.push(id);
            }
        }
        info!(count = created.len(), directories = dirs, "Created entries");
        Ok(created)
    }

    // ========================================================================
    // Copy / Move
    // ========================================================================

    /// Copies every source into `destination` and mirrors the copies
    pub async fn copy(
        &self,
        sources: &[String],
        destination: &str,
        options: TransferOptions,
    ) -> Result<Vec<NodeId>, FmError> {
        let sources: Vec<String> = sources.iter().map(|p| absolute(p)).collect();
        let destination = path::as_dir(&absolute(destination));
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        self.store().copy(&sources, &destination).await?;
        self.transfer(&sources, &destination, Transfer::Copy, options)
            .await
    }

    /// Moves every source into `destination` and mirrors the move
    pub async fn move_items(
        &self,
        sources: &[String],
        destination: &str,
        options: TransferOptions,
    ) -> Result<Vec<NodeId>, FmError> {
        let sources: Vec<String> = sources.iter().map(|p| absolute(p)).collect();
        let destination = path::as_dir(&absolute(destination));
        if sources.is_empty() {
            return Ok(Vec::new());
        }
        self.store()
            .move_to(&sources, &destination, options.deep)
            .await?;
        self.transfer(&sources, &destination, Transfer::Move, options)
            .await
    }

    async fn transfer(
        &self,
        sources: &[String],
        destination: &str,
        kind: Transfer,
        options: TransferOptions,
    ) -> Result<Vec<NodeId>, FmError> {
        let dest = self.cache.resolve_dir(destination).await?;
        let mut placed = Vec::with_capacity(sources.len());

        for source in sources {
            let Some(node) = self.locate(source).await? else {
                debug!(path = %source, "Transferred source was not mirrored, reading it back");
                let name = path::split(source).full_name;
                if let Some((id, collided)) = self.adopt(dest, &name).await? {
                    if options.highlight && !collided {
                        self.cache.write(|t| t.set_active(id, true));
                    }
                    placed.push(id);
                }
                continue;
            };

            let result = self.cache.write(|t| {
                // The backend refuses to move a directory into itself
                if creates_cycle(t, node, dest) {
                    return None;
                }
                let collided = t
                    .get(node)
                    .is_some_and(|n| t.find_child(dest, n.name()).is_some_and(|c| c != node));

                let moving = match kind {
                    Transfer::Copy => t.clone_subtree(node)?,
                    Transfer::Move => {
                        t.detach(node);
                        node
                    }
                };
                let id = t.place(dest, moving)?;
                if options.highlight && !collided {
                    t.set_active(id, true);
                }
                Some(id)
            });

            if let Some(id) = result {
                placed.push(id);
            }
        }

        self.cache.write(|t| t.cascade_paths(dest));
        info!(
            count = placed.len(),
            destination = %destination,
            action = ?kind,
            "Transferred entries"
        );
        Ok(placed)
    }

    // ========================================================================
    // Rename
    // ========================================================================

    /// Applies an explicit `from -> to` mapping
    ///
    /// Fails with [`FmError::DuplicatePath`] before any remote call if a
    /// source or a destination appears twice.
    pub async fn rename(&self, pairs: &[RenamePair]) -> Result<Vec<NodeId>, FmError> {
        let pairs: Vec<RenamePair> = pairs
            .iter()
            .map(|p| RenamePair::new(absolute(&p.from), absolute(&p.to)))
            .collect();
        check_unique(&pairs)?;
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        self.store().rename(&pairs).await?;

        let mut renamed = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            let to = path::split(&pair.to);
            let Some(node) = self.locate(&pair.from).await? else {
                debug!(from = %pair.from, "Renamed source was not mirrored, reading it back");
                let dest = self.cache.resolve_dir(&to.dir).await?;
                if let Some((id, _)) = self.adopt(dest, &to.full_name).await? {
                    renamed.push(id);
                }
                continue;
            };
            let dest = self.cache.resolve_dir(&to.dir).await?;
            let is_dir = self.cache.read(|t| t.get(node).is_some_and(|n| n.is_dir()));
            let icon = self.cache.icon(&to.full_name, is_dir);

            let result = self.cache.write(|t| {
                if creates_cycle(t, node, dest) {
                    warn!(from = %pair.from, to = %pair.to, "Refusing to nest a directory inside itself");
                    return None;
                }
                t.detach(node);
                if let Some(n) = t.get_mut(node) {
                    n.name = to.full_name.clone();
                    n.icon = icon;
                }
                let id = t.place(dest, node)?;
                t.cascade_paths(id);
                Some(id)
            });
            if let Some(id) = result {
                renamed.push(id);
            }
        }
        info!(count = renamed.len(), "Renamed entries");
        Ok(renamed)
    }
}

/// True if placing `node` into `dest` would make it its own ancestor
fn creates_cycle(tree: &Tree, node: NodeId, dest: NodeId) -> bool {
    if node == dest {
        return true;
    }
    match (tree.get(node), tree.get(dest)) {
        (Some(n), Some(d)) => n.is_dir() && path::is_within(d.path(), n.path()),
        _ => true,
    }
}

/// Rejects batches naming a source or a destination twice
fn check_unique(pairs: &[RenamePair]) -> Result<(), FmError> {
    let mut sources = HashSet::new();
    let mut destinations = HashSet::new();
    for pair in pairs {
        let from = path::trim_dir(&pair.from);
        if !sources.insert(from.clone()) {
            return Err(FmError::DuplicatePath(from));
        }
        let to = path::trim_dir(&pair.to);
        if !destinations.insert(to.clone()) {
            return Err(FmError::DuplicatePath(to));
        }
    }
    Ok(())
}
