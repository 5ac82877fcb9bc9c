//! Node lifecycle and synchronization for a watched file-system subtree
//!
//! The arena in [`WorkspaceTree`] owns every node. Parents own their children
//! by handle, children point back at their parent by handle, and the root's
//! parent is the [`NodeId::WORKSPACE`] sentinel.

mod capability;
mod disposal;
pub mod entry;
pub mod loader;
mod node;
mod options;
mod walk;
pub mod watch;
mod workspace;

pub use capability::{Capability, CapabilityRegistry};
pub use entry::{EntryKind, FileSystemEntry};
pub use node::{NodeId, NodeKind, Property, PropertyChanged, TreeNode};
pub use options::TreeOptions;
pub use walk::Walk;
pub use watch::{Intent, IntentSender, IntentTranslator, WatchAdapter};
pub use workspace::WorkspaceTree;

/// Re-export common types for convenience
pub mod prelude {
    pub use super::{
        Capability, EntryKind, FileSystemEntry, Intent, IntentSender, NodeId, NodeKind, Property,
        PropertyChanged, TreeNode, TreeOptions, WorkspaceTree,
    };
}
