//! Traversal over the populated part of a workspace tree

use crate::tree::node::NodeId;
use crate::tree::workspace::WorkspaceTree;
use std::path::Path;

/// Pre-order iterator over a node and its populated descendants
///
/// Cut and disposed nodes are not reachable from their former parents and
/// are never yielded past the starting node.
pub struct Walk<'a> {
    tree: &'a WorkspaceTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        // Reverse so children pop in display order
        self.stack
            .extend(self.tree.children(current).iter().rev().copied());
        Some(current)
    }
}

impl WorkspaceTree {
    /// Walk `start` and everything already populated below it
    pub fn walk(&self, start: NodeId) -> Walk<'_> {
        let stack = if self.node(start).is_some() {
            vec![start]
        } else {
            Vec::new()
        };
        Walk { tree: self, stack }
    }

    /// Get the depth of a node (root = 0)
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).len()
    }

    /// Parents of a node, nearest first, ending at the root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.node(id).map(|n| n.parent());
        while let Some(parent) = current.filter(|p| !p.is_workspace()) {
            ancestors.push(parent);
            current = self.node(parent).map(|n| n.parent());
        }
        ancestors
    }

    /// First current child of `parent` whose entry is at `path`
    pub fn find_child_by_path(&self, parent: NodeId, path: impl AsRef<Path>) -> Option<NodeId> {
        let path = path.as_ref();
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.node(child).is_some_and(|n| n.entry().path() == path))
    }
}
