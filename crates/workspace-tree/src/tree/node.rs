//! Core node types for the workspace tree

use crate::tree::entry::{EntryKind, FileSystemEntry};
use crate::tree::watch::{Intent, WatchAdapter};
use derive_more::Display;

/// Unique identifier for a node within a workspace tree
///
/// Internally an index into the arena. Slots are never reused, so a handle
/// keeps naming the same node (live, cut or disposed) for the tree's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "NodeId({})", _0)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node always has ID 0
    pub const ROOT: NodeId = NodeId(0);

    /// Sentinel parent of the root node; never names a node in the arena
    pub const WORKSPACE: NodeId = NodeId(usize::MAX);

    pub(crate) const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Get the arena index
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns true for the workspace sentinel
    pub const fn is_workspace(self) -> bool {
        self.0 == usize::MAX
    }
}

/// What a node stands for, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum NodeKind {
    /// The workspace root (its parent is the workspace sentinel)
    #[display(fmt = "Root")]
    Root,
    #[display(fmt = "File")]
    File,
    #[display(fmt = "Directory")]
    Directory,
}

impl NodeKind {
    /// Derive the kind from the parent linkage and the backing entry
    pub fn classify(parent: NodeId, entry: &FileSystemEntry) -> Self {
        if parent.is_workspace() {
            return NodeKind::Root;
        }
        match entry.kind() {
            EntryKind::File => NodeKind::File,
            EntryKind::Directory => NodeKind::Directory,
        }
    }
}

/// Node properties a host can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Property {
    #[display(fmt = "Children")]
    Children,
    #[display(fmt = "HasChildren")]
    HasChildren,
    #[display(fmt = "DisplayName")]
    DisplayName,
    #[display(fmt = "IsCut")]
    IsCut,
    #[display(fmt = "IsDisposed")]
    IsDisposed,
    #[display(fmt = "IsUpdatingChildren")]
    IsUpdatingChildren,
    #[display(fmt = "IsExpanded")]
    IsExpanded,
}

/// Change notification for one property of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyChanged {
    pub node: NodeId,
    pub property: Property,
}

/// Where a node is in its population lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Population {
    /// Children have not been built yet
    NotLoaded,
    /// A background enumeration has not been committed yet
    Pending,
    /// Children have been built at least once
    Loaded,
}

/// A single node in the workspace tree
#[derive(Debug)]
pub struct TreeNode {
    pub(crate) kind: NodeKind,
    pub(crate) parent: NodeId,
    pub(crate) entry: FileSystemEntry,
    pub(crate) display_name: String,
    pub(crate) children: Vec<NodeId>,
    pub(crate) has_children: bool,
    pub(crate) population: Population,
    pub(crate) is_cut: bool,
    pub(crate) is_disposed: bool,
    pub(crate) is_expanded: bool,
    pub(crate) synthetic: bool,
    pub(crate) watch: Option<WatchAdapter>,
    /// Intents received while a background population was pending
    pub(crate) held_intents: Vec<Intent>,
}

impl TreeNode {
    pub(crate) fn new(
        parent: NodeId,
        entry: FileSystemEntry,
        display_name: String,
        synthetic: bool,
    ) -> Self {
        let kind = NodeKind::classify(parent, &entry);
        Self {
            kind,
            parent,
            entry,
            display_name,
            children: Vec::new(),
            // Cheap guess until the first population corrects it
            has_children: kind != NodeKind::File,
            population: Population::NotLoaded,
            is_cut: false,
            is_disposed: false,
            is_expanded: false,
            synthetic,
            watch: None,
            held_intents: Vec::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Parent handle; [`NodeId::WORKSPACE`] for the root
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn entry(&self) -> &FileSystemEntry {
        &self.entry
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Current children; always empty once the node is disposed
    pub fn children(&self) -> &[NodeId] {
        if self.is_disposed {
            &[]
        } else {
            &self.children
        }
    }

    pub fn has_children(&self) -> bool {
        !self.is_disposed && self.has_children
    }

    pub fn is_cut(&self) -> bool {
        self.is_cut
    }

    pub fn is_disposed(&self) -> bool {
        self.is_disposed
    }

    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    /// True while a background population is in flight
    pub fn is_updating_children(&self) -> bool {
        !self.is_disposed && self.population == Population::Pending
    }

    /// True once children have been built
    pub fn is_populated(&self) -> bool {
        self.population == Population::Loaded
    }

    /// True while the node owns a watch
    pub fn is_watched(&self) -> bool {
        self.watch.is_some()
    }

    /// The preview child a file node creates for itself
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn priority(&self) -> i32 {
        0
    }

    pub fn can_preview(&self) -> bool {
        self.entry.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        assert_eq!(NodeId::ROOT, NodeId(0));
        assert_eq!(NodeId::new(5).index(), 5);
        assert!(NodeId::WORKSPACE.is_workspace());
        assert!(!NodeId::ROOT.is_workspace());
        assert_eq!(NodeId::new(3).to_string(), "NodeId(3)");
    }

    #[test]
    fn test_kind_from_parent_linkage() {
        let dir = FileSystemEntry::new("/ws", EntryKind::Directory);
        let file = FileSystemEntry::new("/ws/a.txt", EntryKind::File);

        assert_eq!(NodeKind::classify(NodeId::WORKSPACE, &dir), NodeKind::Root);
        assert_eq!(NodeKind::classify(NodeId::ROOT, &dir), NodeKind::Directory);
        assert_eq!(NodeKind::classify(NodeId::ROOT, &file), NodeKind::File);
    }

    #[test]
    fn test_has_children_guess() {
        let dir = TreeNode::new(
            NodeId::ROOT,
            FileSystemEntry::new("/ws/src", EntryKind::Directory),
            "src".into(),
            false,
        );
        let file = TreeNode::new(
            NodeId::ROOT,
            FileSystemEntry::new("/ws/a.txt", EntryKind::File),
            "a.txt".into(),
            false,
        );

        assert!(dir.has_children());
        assert!(!dir.can_preview());
        assert!(!file.has_children());
        assert!(file.can_preview());
        assert_eq!(file.priority(), 0);
    }
}
