//! Lazily loaded mirror of the remote namespace
//!
//! [`TreeCache`] owns the [`Tree`] and the [`IRemoteStore`] it is mirrored
//! from. Directories are fetched on first access; a directory's `locked`
//! flag is set while its listing is in flight, and a second caller waits
//! for that fetch instead of issuing its own.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::domain::{path, FmError, Node, NodeId, NodeKind};
use crate::ports::{EntryDescriptor, IIconResolver, IRemoteStore, NoIcons};

use super::arena::{retain_deepest, Lookup, Tree};

/// Attempts made by [`TreeCache::ensure_loaded`] before giving up
const MAX_LOAD_ATTEMPTS: usize = 3;

/// What to do when [`TreeCache::resolve_with`] hits a missing segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissPolicy {
    /// Fail with [`FmError::NotFound`]
    Fail,
    /// Create the missing nodes locally (directories, except a last
    /// segment without trailing `/`, which becomes an empty file)
    Synthesize,
}

/// Outcome of [`TreeCache::load_children`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// This call fetched the listing
    Loaded,
    /// Another load was in flight; this call waited for it instead
    AwaitedInFlight,
}

/// The client-side mirror of the remote tree
pub struct TreeCache {
    tree: Mutex<Tree>,
    store: Arc<dyn IRemoteStore>,
    icons: Arc<dyn IIconResolver>,
    load_finished: Notify,
}

impl TreeCache {
    /// Creates a cache holding only the unloaded root
    pub fn new(store: Arc<dyn IRemoteStore>) -> Self {
        Self {
            tree: Mutex::new(Tree::new()),
            store,
            icons: Arc::new(NoIcons),
            load_finished: Notify::new(),
        }
    }

    /// Sets the resolver used to derive icon hints for new nodes
    pub fn with_icon_resolver(mut self, icons: Arc<dyn IIconResolver>) -> Self {
        self.icons = icons;
        self
    }

    pub fn store(&self) -> &Arc<dyn IRemoteStore> {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with shared access to the tree
    pub fn read<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> R {
        f(&mut self.lock())
    }

    pub(crate) fn icon(&self, name: &str, is_dir: bool) -> Option<String> {
        self.icons.icon_for(name, is_dir)
    }

    pub fn root(&self) -> NodeId {
        self.read(Tree::root)
    }

    /// Snapshot of a node
    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.read(|t| t.get(id).cloned())
    }

    /// Looks `path` up in the loaded tree without fetching
    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.read(|t| t.find(path))
    }

    /// Snapshot of the node at `path`, if loaded
    pub fn node_at(&self, path: &str) -> Option<Node> {
        self.read(|t| t.find(path).and_then(|id| t.get(id).cloned()))
    }

    /// Snapshots of a loaded directory's children, in display order
    pub fn child_nodes(&self, dir: NodeId) -> Option<Vec<Node>> {
        self.read(|t| {
            t.children(dir)
                .map(|ids| ids.iter().filter_map(|id| t.get(*id).cloned()).collect())
        })
    }

    fn is_locked(&self, id: NodeId) -> bool {
        self.read(|t| t.get(id).is_some_and(Node::is_locked))
    }

    fn is_loaded(&self, id: NodeId) -> bool {
        self.read(|t| t.get(id).is_some_and(Node::is_loaded))
    }

    async fn wait_until_unlocked(&self, id: NodeId) {
        loop {
            // Registered before the check so a wakeup in between is not lost
            let finished = self.load_finished.notified();
            if !self.is_locked(id) {
                return;
            }
            finished.await;
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Fetches a directory's listing and replaces its children
    ///
    /// If a load of the same directory is already in flight, waits for it
    /// and returns [`LoadOutcome::AwaitedInFlight`] without fetching. On
    /// failure the previous children (or `None`) are kept.
    pub async fn load_children(&self, dir: NodeId) -> Result<LoadOutcome, FmError> {
        let claimed = self.write(|t| {
            let node = t
                .get_mut(dir)
                .ok_or_else(|| FmError::NotFound(format!("node {dir}")))?;
            if !node.is_dir() {
                return Err(FmError::NotADirectory(node.path().to_string()));
            }
            if node.locked {
                return Ok(None);
            }
            node.locked = true;
            Ok(Some(node.path().to_string()))
        })?;

        let Some(dir_path) = claimed else {
            debug!(node = %dir, "Listing already in flight, waiting");
            self.wait_until_unlocked(dir).await;
            return Ok(LoadOutcome::AwaitedInFlight);
        };

        debug!(path = %dir_path, "Loading directory listing");
        let result = self.store.list_detailed(&dir_path).await;

        let outcome = self.write(|t| {
            let still_present = match t.get_mut(dir) {
                Some(node) => {
                    node.locked = false;
                    true
                }
                None => false,
            };
            let entries = result?;
            if still_present {
                let count = entries.len();
                let decorated = entries
                    .into_iter()
                    .map(|e| {
                        let icon = self.icons.icon_for(&e.name, e.is_dir());
                        (e, icon)
                    })
                    .collect();
                t.apply_listing(dir, decorated);
                debug!(path = %dir_path, entries = count, "Directory loaded");
            } else {
                warn!(path = %dir_path, "Directory detached while loading, listing dropped");
            }
            Ok(LoadOutcome::Loaded)
        });

        self.load_finished.notify_waiters();
        outcome
    }

    /// Makes sure a directory's children are present, fetching if needed
    pub async fn ensure_loaded(&self, dir: NodeId) -> Result<(), FmError> {
        for _ in 0..MAX_LOAD_ATTEMPTS {
            if self.is_loaded(dir) {
                return Ok(());
            }
            if self.is_locked(dir) {
                self.wait_until_unlocked(dir).await;
                continue;
            }
            self.load_children(dir).await?;
        }
        if self.is_loaded(dir) {
            Ok(())
        } else {
            let path = self
                .node(dir)
                .map(|n| n.path().to_string())
                .unwrap_or_else(|| dir.to_string());
            Err(FmError::NotFound(format!("listing unavailable for {path}")))
        }
    }

    /// Re-fetches `dir` and every descendant directory that was expanded
    ///
    /// Expanded paths are pruned to the deepest ones first: resolving a deep
    /// path reloads its ancestors on the way down. Selected nodes anywhere in
    /// the subtree are selected again if they still exist.
    pub async fn reload_recursive(&self, dir: NodeId) -> Result<(), FmError> {
        let (expanded, selected) = self.read(|t| {
            let selected: Vec<String> = t
                .get_active(dir)
                .into_iter()
                .filter_map(|id| t.get(id).map(|n| n.path().to_string()))
                .collect();
            (t.expanded_descendants(dir), selected)
        });
        self.load_children(dir).await?;

        for dir_path in retain_deepest(expanded) {
            match self.resolve(&dir_path).await {
                Ok(id) => {
                    if self.read(|t| t.get(id).is_some_and(Node::is_dir)) {
                        self.ensure_loaded(id).await?;
                    }
                }
                Err(FmError::NotFound(_)) | Err(FmError::NotADirectory(_)) => {
                    debug!(path = %dir_path, "Expanded directory vanished during reload");
                }
                Err(e) => return Err(e),
            }
        }

        self.write(|t| {
            for selected_path in &selected {
                if let Some(id) = t.find(selected_path) {
                    t.set_active(id, true);
                }
            }
        });
        Ok(())
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolves `path` to a node, fetching unloaded directories on the way
    pub async fn resolve(&self, target: &str) -> Result<NodeId, FmError> {
        self.resolve_with(target, MissPolicy::Fail).await
    }

    /// Resolves `path`, handling missing segments per `policy`
    pub async fn resolve_with(&self, target: &str, policy: MissPolicy) -> Result<NodeId, FmError> {
        let target = absolute(target);
        loop {
            match self.read(|t| t.lookup(&target)) {
                Lookup::Found(id) => return Ok(id),
                Lookup::Unloaded(dir) => self.ensure_loaded(dir).await?,
                Lookup::NotADirectory(id) => {
                    let at = self
                        .node(id)
                        .map(|n| n.path().to_string())
                        .unwrap_or_else(|| target.clone());
                    return Err(FmError::NotADirectory(at));
                }
                Lookup::Missing {
                    parent,
                    name,
                    remaining,
                } => match policy {
                    MissPolicy::Fail => return Err(FmError::NotFound(target)),
                    MissPolicy::Synthesize => {
                        let entry = if remaining > 0 || target.ends_with('/') {
                            EntryDescriptor::dir(name)
                        } else {
                            EntryDescriptor::file(name, 0)
                        };
                        debug!(path = %target, segment = %entry.name, "Synthesizing missing node");
                        self.insert_entry(parent, &entry, true);
                    }
                },
            }
        }
    }

    /// Resolves `path` to a directory and makes sure it is loaded
    pub async fn resolve_dir(&self, target: &str) -> Result<NodeId, FmError> {
        let id = self.resolve(target).await?;
        if !self.read(|t| t.get(id).is_some_and(Node::is_dir)) {
            return Err(FmError::NotADirectory(absolute(target)));
        }
        self.ensure_loaded(id).await?;
        Ok(id)
    }

    /// Re-reads one entry's metadata and updates it in place
    ///
    /// A node whose kind changed remotely is replaced. An entry missing from
    /// the tree is inserted if its parent is loaded.
    pub async fn refresh_entry(&self, target: &str) -> Result<NodeId, FmError> {
        let target = absolute(target);
        let entry = self.store.stat(&target).await?;
        let parent_path = path::split(&target).dir;
        let parent = self.resolve_dir(&parent_path).await?;

        let updated = self.write(|t| {
            let existing = t.find_child(parent, &entry.name);
            if let Some(id) = existing {
                if let Some(node) = t.get_mut(id) {
                    if node.is_dir() == entry.is_dir() {
                        if let NodeKind::File { size } = &mut node.kind {
                            *size = entry.size;
                        }
                        if let Some(created) = entry.created {
                            node.created = created;
                        }
                        return Some(id);
                    }
                }
            }
            None
        });

        match updated {
            Some(id) => Ok(id),
            None => self
                .insert_entry(parent, &entry, false)
                .ok_or(FmError::NotFound(target)),
        }
    }

    /// Creates a node from `entry` and inserts it into a loaded directory
    ///
    /// A same-named child is replaced. Returns `None` if `dir` is not loaded.
    pub(crate) fn insert_entry(
        &self,
        dir: NodeId,
        entry: &EntryDescriptor,
        known_empty: bool,
    ) -> Option<NodeId> {
        let icon = self.icon(&entry.name, entry.is_dir());
        self.write(|t| {
            let id = t.alloc(entry, icon, known_empty);
            t.attach(dir, id).then_some(id)
        })
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Active children of every directory at or below `from`
    pub fn get_active(&self, from: NodeId) -> Vec<NodeId> {
        self.read(|t| t.get_active(from))
    }

    /// Clears every active set at or below `from`
    pub fn clear_active(&self, from: NodeId) {
        self.write(|t| t.clear_active(from));
    }
}

/// Normalizes and anchors a path at the root
pub(crate) fn absolute(target: &str) -> String {
    let normalized = path::normalize(target);
    if normalized.starts_with('/') {
        normalized
    } else {
        path::normalize(&format!("/{normalized}"))
    }
}
