//! Arena holding every node of the mirror
//!
//! Nodes are stored by [`NodeId`] in a flat map; directories keep ordered
//! child id lists and parents are plain ids. All structural edits (attach,
//! detach, merge, path cascade) happen here, synchronously, so the async
//! layer above only ever holds the lock between suspension points.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::domain::node::display_order;
use crate::domain::{path, Node, NodeId, NodeKind};
use crate::ports::EntryDescriptor;

/// Result of walking a path through the loaded part of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Every segment exists
    Found(NodeId),
    /// The walk reached a directory whose children were never fetched
    Unloaded(NodeId),
    /// `name` does not exist under the loaded directory `parent`
    Missing {
        parent: NodeId,
        name: String,
        /// Segments left after `name`
        remaining: usize,
    },
    /// A segment other than the last names a file
    NotADirectory(NodeId),
}

/// The mirror tree
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a tree containing only the unloaded root directory `/`
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut node = Node::new_directory(root, "", Utc::now(), None);
        node.path = "/".to_string();
        let mut nodes = HashMap::new();
        nodes.insert(root, node);
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Number of nodes held in the arena, the root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Ordered children of a loaded directory
    pub fn children(&self, dir: NodeId) -> Option<&[NodeId]> {
        self.nodes.get(&dir).and_then(Node::children)
    }

    pub fn find_child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.children(dir)?
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).is_some_and(|n| n.name == name))
    }

    /// Walks `path` from the root without fetching anything
    pub fn lookup(&self, target: &str) -> Lookup {
        let segments = path::segments(target);
        let mut current = self.root;

        for (idx, segment) in segments.iter().enumerate() {
            let Some(node) = self.nodes.get(&current) else {
                return Lookup::NotADirectory(current);
            };
            match &node.kind {
                NodeKind::File { .. } => return Lookup::NotADirectory(current),
                NodeKind::Directory { children: None, .. } => return Lookup::Unloaded(current),
                NodeKind::Directory { .. } => match self.find_child(current, segment) {
                    Some(child) => current = child,
                    None => {
                        return Lookup::Missing {
                            parent: current,
                            name: segment.clone(),
                            remaining: segments.len() - idx - 1,
                        }
                    }
                },
            }
        }

        Lookup::Found(current)
    }

    /// Returns the node at `path` if it is present in the loaded tree
    pub fn find(&self, target: &str) -> Option<NodeId> {
        match self.lookup(target) {
            Lookup::Found(id) => Some(id),
            _ => None,
        }
    }

    /// Paths of every loaded directory strictly below `dir`
    pub fn expanded_descendants(&self, dir: NodeId) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(dir).map(<[_]>::to_vec).unwrap_or_default();
        while let Some(id) = stack.pop() {
            if let Some(children) = self.children(id) {
                if let Some(node) = self.nodes.get(&id) {
                    out.push(node.path.clone());
                }
                stack.extend_from_slice(children);
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Allocates a detached node from a listing descriptor
    ///
    /// Directories start unloaded unless `known_empty` is set (a directory
    /// the client just created).
    pub(crate) fn alloc(
        &mut self,
        entry: &EntryDescriptor,
        icon: Option<String>,
        known_empty: bool,
    ) -> NodeId {
        let id = self.next_id();
        let created: DateTime<Utc> = entry.created.unwrap_or_else(Utc::now);
        let mut node = if entry.is_dir() {
            let children = known_empty.then(Vec::new);
            Node::new_directory(id, entry.name.clone(), created, children)
        } else {
            Node::new_file(id, entry.name.clone(), entry.size, created)
        };
        node.icon = icon;
        self.nodes.insert(id, node);
        id
    }

    /// Deep-copies a subtree; the copy is detached and gets fresh ids
    pub(crate) fn clone_subtree(&mut self, id: NodeId) -> Option<NodeId> {
        let mut copy = self.nodes.get(&id)?.clone();
        let copy_id = self.next_id();
        copy.id = copy_id;
        copy.parent = None;
        copy.locked = false;
        copy.upload_progress = None;
        if let NodeKind::Directory { children, active } = &mut copy.kind {
            active.clear();
            if let Some(kids) = children.take() {
                let mut cloned = Vec::with_capacity(kids.len());
                for kid in kids {
                    if let Some(kid_copy) = self.clone_subtree(kid) {
                        cloned.push(kid_copy);
                    }
                }
                *children = Some(cloned);
            }
        }
        self.nodes.insert(copy_id, copy);

        let kids: Vec<NodeId> = self.children(copy_id).map(<[_]>::to_vec).unwrap_or_default();
        for kid in kids {
            if let Some(node) = self.nodes.get_mut(&kid) {
                node.parent = Some(copy_id);
            }
        }
        Some(copy_id)
    }

    // ------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------

    /// Inserts a detached node into a loaded directory
    ///
    /// Keeps display order and replaces any same-named child. Returns
    /// `false` (and drops the node) if `dir` is not a loaded directory.
    pub(crate) fn attach(&mut self, dir: NodeId, child: NodeId) -> bool {
        let Some(name) = self.nodes.get(&child).map(|n| n.name.clone()) else {
            return false;
        };
        if self.children(dir).is_none() {
            self.remove_subtree(child);
            return false;
        }
        if let Some(existing) = self.find_child(dir, &name) {
            if existing != child {
                self.remove_subtree(existing);
            }
        }

        let position = {
            let Some(new_node) = self.nodes.get(&child) else {
                return false;
            };
            let siblings = self.children(dir).unwrap_or_default();
            siblings
                .iter()
                .position(|id| {
                    self.nodes
                        .get(id)
                        .is_some_and(|n| display_order(new_node, n).is_lt())
                })
                .unwrap_or(siblings.len())
        };

        if let Some(NodeKind::Directory {
            children: Some(children),
            ..
        }) = self.nodes.get_mut(&dir).map(|n| &mut n.kind)
        {
            children.insert(position, child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(dir);
        }
        self.cascade_paths(child);
        true
    }

    /// Unlinks a node from its parent's children and active set
    ///
    /// The node and its subtree stay in the arena so they can be attached
    /// elsewhere.
    pub(crate) fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get_mut(&id).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(NodeKind::Directory { children, active }) =
            self.nodes.get_mut(&parent).map(|n| &mut n.kind)
        {
            if let Some(children) = children {
                children.retain(|c| *c != id);
            }
            active.remove(&id);
        }
    }

    /// Detaches a node and drops it together with all its descendants
    pub(crate) fn remove_subtree(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                if let Some(children) = node.children() {
                    stack.extend_from_slice(children);
                }
            }
        }
    }

    /// Forgets a directory's children so the next access refetches them
    pub(crate) fn invalidate(&mut self, dir: NodeId) {
        let kids: Vec<NodeId> = self.children(dir).map(<[_]>::to_vec).unwrap_or_default();
        for kid in kids {
            self.remove_subtree(kid);
        }
        if let Some(NodeKind::Directory { children, active }) =
            self.nodes.get_mut(&dir).map(|n| &mut n.kind)
        {
            *children = None;
            active.clear();
        }
    }

    /// Recomputes the path of `id` from its parent, then of every descendant
    pub(crate) fn cascade_paths(&mut self, id: NodeId) {
        let parent_path = self
            .nodes
            .get(&id)
            .and_then(|n| n.parent)
            .and_then(|p| self.nodes.get(&p))
            .map(|p| p.path.clone());
        if let (Some(parent_path), Some(node)) = (parent_path, self.nodes.get_mut(&id)) {
            node.path = node.path_under(&parent_path);
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let (current_path, kids) = match self.nodes.get(&current) {
                Some(node) => (
                    node.path.clone(),
                    node.children().map(<[_]>::to_vec).unwrap_or_default(),
                ),
                None => continue,
            };
            for kid in kids {
                if let Some(node) = self.nodes.get_mut(&kid) {
                    node.path = node.path_under(&current_path);
                    stack.push(kid);
                }
            }
        }
    }

    /// Places a detached node into `dir`, resolving a name collision
    ///
    /// - no collision: the node is attached as is
    /// - both directories: `node` is merged into the existing directory
    /// - otherwise: the existing child is replaced
    ///
    /// Returns the id now standing in `dir` under that name, or `None` if
    /// `dir` is not loaded (the node is then dropped).
    pub(crate) fn place(&mut self, dir: NodeId, node: NodeId) -> Option<NodeId> {
        let (name, is_dir) = {
            let n = self.nodes.get(&node)?;
            (n.name.clone(), n.is_dir())
        };
        if self.children(dir).is_none() {
            self.remove_subtree(node);
            return None;
        }

        match self.find_child(dir, &name) {
            Some(existing)
                if existing != node
                    && is_dir
                    && self.nodes.get(&existing).is_some_and(Node::is_dir) =>
            {
                self.merge_into(node, existing);
                Some(existing)
            }
            _ => self.attach(dir, node).then_some(node),
        }
    }

    /// Recursively merges the children of directory `source` into `target`
    ///
    /// Files replace same-named files, directories merge into same-named
    /// directories. `source` is dropped afterwards. If `source` was never
    /// loaded its content is unknown, so `target` is invalidated instead.
    pub(crate) fn merge_into(&mut self, source: NodeId, target: NodeId) {
        let source_children = self.children(source).map(<[_]>::to_vec);
        let target_loaded = self.children(target).is_some();

        match (source_children, target_loaded) {
            (Some(kids), true) => {
                for kid in kids {
                    self.detach(kid);
                    self.place(target, kid);
                }
            }
            (None, true) => self.invalidate(target),
            (_, false) => {}
        }
        self.remove_subtree(source);
        self.cascade_paths(target);
    }

    /// Replaces a directory's children with a fresh listing
    ///
    /// Children that were selected before are selected again if a child of
    /// the same name is still present.
    pub(crate) fn apply_listing(
        &mut self,
        dir: NodeId,
        entries: Vec<(EntryDescriptor, Option<String>)>,
    ) {
        let previously_active: HashSet<String> = self
            .nodes
            .get(&dir)
            .map(|n| {
                n.active()
                    .into_iter()
                    .filter_map(|id| self.nodes.get(&id).map(|c| c.name.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let old: Vec<NodeId> = self.children(dir).map(<[_]>::to_vec).unwrap_or_default();
        for kid in old {
            self.remove_subtree(kid);
        }

        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(entries.len());
        for (entry, icon) in entries {
            if entry.name.is_empty() || entry.name.contains('/') || !seen.insert(entry.name.clone())
            {
                continue;
            }
            let id = self.alloc(&entry, icon, false);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.parent = Some(dir);
            }
            ids.push(id);
        }
        ids.sort_by(|a, b| match (self.nodes.get(a), self.nodes.get(b)) {
            (Some(x), Some(y)) => display_order(x, y),
            _ => std::cmp::Ordering::Equal,
        });

        let reselected: BTreeSet<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .is_some_and(|n| previously_active.contains(&n.name))
            })
            .collect();

        if let Some(NodeKind::Directory { children, active }) =
            self.nodes.get_mut(&dir).map(|n| &mut n.kind)
        {
            *children = Some(ids);
            *active = reselected;
        }
        self.cascade_paths(dir);
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Adds or removes `child` from its parent's active set
    pub(crate) fn set_active(&mut self, child: NodeId, on: bool) -> bool {
        let Some(parent) = self.nodes.get(&child).and_then(|n| n.parent) else {
            return false;
        };
        match self.nodes.get_mut(&parent).map(|n| &mut n.kind) {
            Some(NodeKind::Directory { active, .. }) => {
                if on {
                    active.insert(child);
                } else {
                    active.remove(&child);
                }
                true
            }
            _ => false,
        }
    }

    /// Collects the active children of every directory at or below `from`
    pub fn get_active(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.extend(node.active());
            if let Some(children) = node.children() {
                stack.extend(
                    children
                        .iter()
                        .rev()
                        .filter(|id| self.nodes.get(id).is_some_and(Node::is_dir)),
                );
            }
        }
        out
    }

    /// Clears the active set of every directory at or below `from`
    pub(crate) fn clear_active(&mut self, from: NodeId) {
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if let Some(NodeKind::Directory { children, active }) =
                self.nodes.get_mut(&current).map(|n| &mut n.kind)
            {
                active.clear();
                if let Some(children) = children {
                    stack.extend_from_slice(children);
                }
            }
        }
    }

    /// Checks the structural invariants of the whole loaded tree
    ///
    /// Returns a description of the first violation found.
    pub fn verify(&self) -> Result<(), String> {
        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| format!("dangling id {current}"))?;
            let NodeKind::Directory { children, active } = &node.kind else {
                continue;
            };
            let Some(children) = children else {
                if !active.is_empty() {
                    return Err(format!("{} is unloaded but has a selection", node.path));
                }
                continue;
            };
            for id in active {
                if !children.contains(id) {
                    return Err(format!("{} selects a non-child {id}", node.path));
                }
            }
            for pair in children.windows(2) {
                let (a, b) = (self.nodes.get(&pair[0]), self.nodes.get(&pair[1]));
                if let (Some(a), Some(b)) = (a, b) {
                    if !display_order(a, b).is_lt() {
                        return Err(format!("{} children out of order", node.path));
                    }
                }
            }
            for id in children {
                let child = self
                    .nodes
                    .get(id)
                    .ok_or_else(|| format!("dangling child {id} of {}", node.path))?;
                if child.parent != Some(current) {
                    return Err(format!("{} has a wrong parent", child.path));
                }
                let expected = child.path_under(&node.path);
                if child.path != expected {
                    return Err(format!("{} should be {expected}", child.path));
                }
                stack.push(*id);
            }
        }
        Ok(())
    }
}

/// Keeps only the deepest paths: drops every path that prefixes another
pub fn retain_deepest(mut paths: Vec<String>) -> Vec<String> {
    paths.sort();
    paths.dedup();
    let mut out = Vec::with_capacity(paths.len());
    for (idx, p) in paths.iter().enumerate() {
        let prefixes_next = paths.get(idx + 1).is_some_and(|next| next.starts_with(p.as_str()));
        if !prefixes_next {
            out.push(p.clone());
        }
    }
    out
}
