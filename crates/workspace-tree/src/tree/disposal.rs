//! Recursive teardown of nodes

use crate::tree::node::{NodeId, Population, Property};
use crate::tree::workspace::WorkspaceTree;
use log::debug;
use std::mem;

impl WorkspaceTree {
    /// Dispose a node and everything below it
    ///
    /// Releases the node's watch, disposes every current child, then marks
    /// the node dead. The slot stays so the handle keeps answering queries,
    /// but its children and held intents are freed. Repeated calls are no-ops. A disposed node keeps
    /// answering [`is_disposed`](crate::tree::TreeNode::is_disposed) and
    /// capability queries; everything else about it is inert.
    pub fn dispose(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.index()) else {
            return;
        };
        if node.is_disposed {
            return;
        }

        if let Some(watch) = node.watch.take() {
            watch.release();
        }

        node.held_intents = Vec::new();
        let children = mem::take(&mut node.children);
        let pending = node.population == Population::Pending;
        for child in children {
            self.dispose(child);
        }

        // A result still in flight is dropped on arrival
        if pending {
            self.set_population(id, Population::NotLoaded);
        }
        self.nodes[id.index()].is_disposed = true;
        debug!("Disposed {}", id);
        self.emit(id, Property::IsDisposed);
    }

    /// Tear down the whole workspace
    ///
    /// Disposes the root, then any cut node that was unlinked by a deletion
    /// but never disposed.
    pub fn shutdown(&mut self) {
        self.dispose(self.root());

        let zombies: Vec<NodeId> = (0..self.nodes.len())
            .map(NodeId::new)
            .filter(|id| {
                let node = &self.nodes[id.index()];
                node.is_cut && !node.is_disposed
            })
            .collect();
        for zombie in zombies {
            self.dispose(zombie);
        }
    }
}
