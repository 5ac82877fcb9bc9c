//! Capabilities a node exposes to its host

use crate::tree::node::NodeId;
use crate::tree::workspace::WorkspaceTree;
use derive_more::Display;

/// A behavior a host can ask a node for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Capability {
    /// Name, icon and other display data
    #[display(fmt = "DisplayItem")]
    DisplayItem,
    /// Property-browser object
    #[display(fmt = "Browsable")]
    Browsable,
    #[display(fmt = "ContextMenu")]
    ContextMenu,
    /// Open/activate handling
    #[display(fmt = "Invocation")]
    Invocation,
    /// Expand and collapse callbacks
    #[display(fmt = "ExpansionEvents")]
    ExpansionEvents,
    /// Reports whether the node is dead
    #[display(fmt = "DisposalNotification")]
    DisposalNotification,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::DisplayItem,
        Capability::Browsable,
        Capability::ContextMenu,
        Capability::Invocation,
        Capability::ExpansionEvents,
        Capability::DisposalNotification,
    ];
}

/// Static table of supported capabilities, keyed only by liveness
pub struct CapabilityRegistry;

impl CapabilityRegistry {
    const LIVE: &'static [Capability] = &Capability::ALL;
    const DISPOSED: &'static [Capability] = &[Capability::DisposalNotification];

    /// Capabilities supported by a live or a disposed node
    pub fn supported(is_disposed: bool) -> &'static [Capability] {
        if is_disposed {
            Self::DISPOSED
        } else {
            Self::LIVE
        }
    }

    pub fn supports(is_disposed: bool, capability: Capability) -> bool {
        Self::supported(is_disposed).contains(&capability)
    }
}

impl WorkspaceTree {
    /// Look up a capability on a node
    ///
    /// Returns the node itself when supported, `None` otherwise.
    pub fn query_capability(&self, id: NodeId, capability: Capability) -> Option<NodeId> {
        let node = self.node(id)?;
        CapabilityRegistry::supports(node.is_disposed(), capability).then_some(id)
    }
}
