//! Workspace Tree Library
//!
//! A live, lazily-populated model of a file-system subtree for explorer-style
//! tree views. Nodes discover their children on first expansion, watch their
//! directory while active, and reconcile out-of-band changes (created, deleted,
//! renamed entries) against their child lists.
//!
//! # Core Concepts
//!
//! - **WorkspaceTree**: arena of nodes plus the single-writer message loop
//! - **TreeNode**: one file, directory, or the workspace root
//! - **WatchAdapter**: a node's exclusive directory watch, producing intents
//! - **Intent**: a normalized `Created`/`Deleted`/`Renamed` change
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use workspace_tree::prelude::*;
//!
//! let mut tree = WorkspaceTree::open("./src", TreeOptions::default())?;
//! let root = tree.root();
//! tree.expand(root);
//!
//! for id in tree.walk(root) {
//!     let node = tree.node(id).unwrap();
//!     println!("{:indent$}{}", "", node.display_name(), indent = tree.depth(id) * 2);
//! }
//!
//! // Apply whatever the watches reported in the meantime
//! tree.wait_for_messages(Duration::from_millis(500));
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod tree;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::tree::prelude::*;
}
