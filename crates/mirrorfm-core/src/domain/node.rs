//! Mirror tree nodes
//!
//! A [`Node`] is either a File or a Directory. Nodes live in an arena owned
//! by the tree and refer to each other by [`NodeId`]; the `parent` field is
//! a non-owning handle used only for upward traversal.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::path;

/// Opaque, stable identity of a node inside one tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Returns the raw id value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// File or Directory specific state
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    File {
        /// Size in bytes
        size: u64,
    },
    Directory {
        /// Direct children; `None` until the listing has been fetched
        children: Option<Vec<NodeId>>,
        /// Currently selected direct children
        active: BTreeSet<NodeId>,
    },
}

/// Whether a node is a file or a directory, without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
}

/// A single node of the mirror
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) created: DateTime<Utc>,
    pub(crate) icon: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) locked: bool,
    pub(crate) upload_progress: Option<f32>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new_file(
        id: NodeId,
        name: impl Into<String>,
        size: u64,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            path: String::new(),
            created,
            icon: None,
            parent: None,
            locked: false,
            upload_progress: None,
            kind: NodeKind::File { size },
        }
    }

    pub(crate) fn new_directory(
        id: NodeId,
        name: impl Into<String>,
        created: DateTime<Utc>,
        children: Option<Vec<NodeId>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            path: String::new(),
            created,
            icon: None,
            parent: None,
            locked: false,
            upload_progress: None,
            kind: NodeKind::Directory {
                children,
                active: BTreeSet::new(),
            },
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute normalized path; directories end with `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// True while a reload of this directory's children is in flight
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Upload percentage (0..=100) while a transfer is running
    pub fn upload_progress(&self) -> Option<f32> {
        self.upload_progress
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn entry_type(&self) -> EntryType {
        match self.kind {
            NodeKind::File { .. } => EntryType::File,
            NodeKind::Directory { .. } => EntryType::Dir,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// File size, `None` for directories
    pub fn size(&self) -> Option<u64> {
        match self.kind {
            NodeKind::File { size } => Some(size),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Child ids, `None` for files and unloaded directories
    pub fn children(&self) -> Option<&[NodeId]> {
        match &self.kind {
            NodeKind::Directory {
                children: Some(children),
                ..
            } => Some(children),
            _ => None,
        }
    }

    /// True for directories whose listing has been fetched
    pub fn is_loaded(&self) -> bool {
        self.children().is_some()
    }

    /// Selected children, empty for files
    pub fn active(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Directory { active, .. } => active.iter().copied().collect(),
            NodeKind::File { .. } => Vec::new(),
        }
    }

    /// Path this node would have as a child of `dir_path`
    pub(crate) fn path_under(&self, dir_path: &str) -> String {
        path::child_path(dir_path, &self.name, self.is_dir())
    }
}

/// Display order: directories before files, each group by name
pub(crate) fn display_order(a: &Node, b: &Node) -> Ordering {
    let rank = |n: &Node| u8::from(!n.is_dir());
    rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
}
