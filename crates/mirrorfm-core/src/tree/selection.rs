//! Path-addressed selection on top of the per-directory active sets

use std::sync::Arc;

use crate::domain::{FmError, NodeId};

use super::cache::TreeCache;

/// Selects, deselects and collects nodes by path
pub struct SelectionTracker {
    cache: Arc<TreeCache>,
}

impl SelectionTracker {
    pub fn new(cache: Arc<TreeCache>) -> Self {
        Self { cache }
    }

    fn loaded_node(&self, target: &str) -> Result<NodeId, FmError> {
        self.cache
            .find(target)
            .ok_or_else(|| FmError::NotFound(target.to_string()))
    }

    /// Adds the node at `path` to its parent's active set
    pub fn select(&self, target: &str) -> Result<(), FmError> {
        let id = self.loaded_node(target)?;
        self.cache.write(|t| t.set_active(id, true));
        Ok(())
    }

    pub fn deselect(&self, target: &str) -> Result<(), FmError> {
        let id = self.loaded_node(target)?;
        self.cache.write(|t| t.set_active(id, false));
        Ok(())
    }

    /// Flips the selection state, returning the new state
    pub fn toggle(&self, target: &str) -> Result<bool, FmError> {
        let id = self.loaded_node(target)?;
        Ok(self.cache.write(|t| {
            let selected = t
                .get(id)
                .and_then(|n| n.parent())
                .and_then(|p| t.get(p))
                .is_some_and(|p| p.active().contains(&id));
            t.set_active(id, !selected);
            !selected
        }))
    }

    /// Makes `path` the only selected node in the whole tree
    pub fn select_only(&self, target: &str) -> Result<(), FmError> {
        let id = self.loaded_node(target)?;
        self.cache.write(|t| {
            let root = t.root();
            t.clear_active(root);
            t.set_active(id, true);
        });
        Ok(())
    }

    /// Paths of every selected node at or below `root_path`
    pub fn selected_paths(&self, root_path: &str) -> Result<Vec<String>, FmError> {
        let from = self.loaded_node(root_path)?;
        Ok(self.cache.read(|t| {
            t.get_active(from)
                .into_iter()
                .filter_map(|id| t.get(id).map(|n| n.path().to_string()))
                .collect()
        }))
    }

    /// Clears every selection at or below `root_path`
    pub fn clear(&self, root_path: &str) -> Result<(), FmError> {
        let from = self.loaded_node(root_path)?;
        self.cache.clear_active(from);
        Ok(())
    }
}
