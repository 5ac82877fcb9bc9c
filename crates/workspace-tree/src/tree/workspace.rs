//! The workspace tree: node arena, population and reconciliation

use crate::tree::entry::FileSystemEntry;
use crate::tree::loader;
use crate::tree::node::{NodeId, NodeKind, Population, Property, PropertyChanged, TreeNode};
use crate::tree::options::TreeOptions;
use crate::tree::watch::{Intent, IntentSender, Message, WatchAdapter, RENAME_PAIR_WINDOW};
use anyhow::{bail, Context, Result};
use flume::{Receiver, Sender};
use log::{debug, info, trace, warn};
use path_clean::PathClean;
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::mem;
use std::path::Path;
use std::time::Duration;

/// A live, lazily populated model of one workspace directory
///
/// All node state is owned here and only changes through `&mut self`, which
/// makes the owner of the tree its single writer. Watches and background
/// enumerations never touch nodes; they queue [`Message`]s that the owner
/// applies with [`process_pending`](Self::process_pending) or
/// [`wait_for_messages`](Self::wait_for_messages).
///
/// # Example
///
/// ```ignore
/// let mut tree = WorkspaceTree::open("/path/to/workspace", TreeOptions::default())?;
///
/// // Populates the root and starts watching it
/// tree.expand(tree.root());
///
/// loop {
///     tree.wait_for_messages(Duration::from_millis(250));
/// }
/// ```
pub struct WorkspaceTree {
    /// Arena storage for nodes
    pub(crate) nodes: Vec<TreeNode>,
    options: TreeOptions,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    subscribers: Vec<Sender<PropertyChanged>>,
}

impl WorkspaceTree {
    /// Open a workspace rooted at the given directory
    ///
    /// Only the root node exists afterwards; nothing is enumerated or watched
    /// until it is expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if the path doesn't exist or isn't a directory.
    pub fn open(path: impl AsRef<Path>, options: TreeOptions) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to open workspace {}", path.display()))?;
        if !metadata.is_dir() {
            bail!("Workspace root {} is not a directory", path.display());
        }

        // Native backends report canonical paths on some platforms
        let root_path = fs::canonicalize(path).unwrap_or_else(|_| path.clean());
        let entry = FileSystemEntry::resolve(&root_path)
            .with_context(|| format!("Failed to resolve {}", root_path.display()))?;

        let (tx, rx) = flume::unbounded();
        let root = TreeNode::new(NodeId::WORKSPACE, entry, options.root_label.clone(), false);

        info!("Opened workspace {}", root_path.display());
        Ok(Self {
            nodes: vec![root],
            options,
            tx,
            rx,
            subscribers: Vec::new(),
        })
    }

    /// Get the root node ID (always exists)
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by its ID
    ///
    /// Returns `None` for invalid IDs and the workspace sentinel.
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.index())
    }

    /// Count every node ever created, including cut and disposed ones
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Current children of a node; empty for invalid IDs
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(TreeNode::children).unwrap_or(&[])
    }

    /// Cheap answer to "can this node be expanded"
    pub fn has_children(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(TreeNode::has_children)
    }

    /// Subscribe to property-change notifications
    pub fn subscribe(&mut self) -> Receiver<PropertyChanged> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// A handle for queueing intents from outside the owner
    pub fn intent_sender(&self) -> IntentSender {
        IntentSender::new(self.tx.clone())
    }

    /// Order two nodes by display name, ignoring case
    pub fn compare_display(&self, a: NodeId, b: NodeId) -> Ordering {
        match (self.node(a), self.node(b)) {
            (Some(a), Some(b)) => a
                .display_name()
                .to_lowercase()
                .cmp(&b.display_name().to_lowercase()),
            _ => Ordering::Equal,
        }
    }

    /// Prepare a node for display as expanded
    ///
    /// The first expansion populates the node if it may have children, and a
    /// directory-backed node starts watching. Later expansions keep whatever
    /// the watch has reconciled since.
    pub fn expand(&mut self, id: NodeId) {
        let Some(node) = self.live(id) else {
            trace!("Ignoring expand of dead node {}", id);
            return;
        };
        let needs_population = node.children.is_empty()
            && node.has_children
            && node.population != Population::Pending;

        self.set_expanded(id, true);

        if needs_population {
            if self.options.defer_population && self.is_near_root(id) {
                self.populate_in_background(id);
            } else {
                self.build_children(id);
            }
        }

        self.start_watching(id);
    }

    /// Mark a node collapsed; its children and watch stay as they are
    pub fn collapse(&mut self, id: NodeId) {
        if self.live(id).is_some() {
            self.set_expanded(id, false);
        }
    }

    /// Rebuild a node's children from disk right now
    ///
    /// A file gets a single synthetic child wrapping its own entry. A
    /// directory gets one child per immediate entry, directories first.
    /// Children being replaced are disposed.
    pub fn build_children(&mut self, id: NodeId) {
        let Some(node) = self.live(id) else {
            return;
        };

        let (entries, synthetic) = match node.kind {
            NodeKind::File => (Ok(vec![node.entry.clone()]), true),
            NodeKind::Root | NodeKind::Directory => (loader::load_children(node.entry.path()), false),
        };

        self.commit_children(id, entries, synthetic);
    }

    /// Give a directory-backed node its watch, once
    ///
    /// Failures are logged and leave the node unwatched; the next expansion
    /// tries again.
    pub fn start_watching(&mut self, id: NodeId) {
        let Some(node) = self.live(id) else {
            return;
        };
        if !node.entry.is_dir() || node.watch.is_some() {
            return;
        }

        let dir = node.entry.path().to_path_buf();
        match WatchAdapter::create(id, &dir, self.intent_sender(), &self.options) {
            Ok(adapter) => {
                adapter.enable();
                self.nodes[id.index()].watch = Some(adapter);
            }
            Err(e) => warn!("Could not watch {}: {:#}", dir.display(), e),
        }
    }

    /// Apply one intent to a node's children
    ///
    /// Never fails: intents naming vanished paths or unknown children are
    /// absorbed. While a background population is pending the intent is held
    /// back and replayed on top of the committed children.
    pub fn apply_intent(&mut self, id: NodeId, intent: Intent) {
        let Some(node) = self.live(id) else {
            trace!("Dropping {:?} for dead node {}", intent, id);
            return;
        };
        if node.population == Population::Pending {
            trace!("Holding {:?} until {} is populated", intent, id);
            self.nodes[id.index()].held_intents.push(intent);
            return;
        }

        debug!("Reconciling {:?} into {}", intent, id);
        match intent {
            Intent::Created(path) => self.on_created(id, &path),
            Intent::Deleted(path) => self.on_deleted(id, &path),
            Intent::Renamed { from, to } => self.on_renamed(id, &from, &to),
        }
    }

    /// Apply everything queued so far without blocking
    ///
    /// Rename halves that have waited past [`RENAME_PAIR_WINDOW`] are queued
    /// as deletions first. Returns the number of messages taken off the queue.
    pub fn process_pending(&mut self) -> usize {
        self.sweep_watches();
        let mut applied = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.dispatch(message);
            applied += 1;
        }
        applied
    }

    /// Block until a message arrives or `timeout` elapses, then drain the queue
    ///
    /// While a rename half is waiting for its partner the wait is cut to
    /// [`RENAME_PAIR_WINDOW`], so an entry moved out of a watched directory
    /// is removed without further events.
    pub fn wait_for_messages(&mut self, timeout: Duration) -> usize {
        let timeout = if self.has_unpaired_renames() {
            timeout.min(RENAME_PAIR_WINDOW)
        } else {
            timeout
        };
        match self.rx.recv_timeout(timeout) {
            Ok(message) => {
                self.dispatch(message);
                1 + self.process_pending()
            }
            Err(_) => self.process_pending(),
        }
    }

    fn sweep_watches(&self) {
        for watch in self.nodes.iter().filter_map(|node| node.watch.as_ref()) {
            watch.sweep(RENAME_PAIR_WINDOW);
        }
    }

    fn has_unpaired_renames(&self) -> bool {
        self.nodes
            .iter()
            .filter_map(|node| node.watch.as_ref())
            .any(WatchAdapter::has_unpaired)
    }

    fn dispatch(&mut self, message: Message) {
        match message {
            Message::Intent { node, intent } => self.apply_intent(node, intent),
            Message::Populated { node, entries } => {
                let pending = self
                    .live(node)
                    .is_some_and(|n| n.population == Population::Pending);
                if pending {
                    self.commit_children(node, entries, false);
                } else {
                    trace!("Dropping stale population result for {}", node);
                }
            }
        }
    }

    fn on_created(&mut self, id: NodeId, path: &Path) {
        let entry = match FileSystemEntry::resolve(path) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping created {}: {}", path.display(), e);
                return;
            }
        };

        let child = self.insert_node(id, entry, false);
        self.nodes[id.index()].children.push(child);
        self.refresh_has_children(id);
    }

    fn on_deleted(&mut self, id: NodeId, path: &Path) {
        let Some(position) = self.position_of(id, path) else {
            return;
        };

        let child = self.nodes[id.index()].children[position];
        self.set_cut(child, true);
        self.nodes[id.index()].children.remove(position);
        self.refresh_has_children(id);
    }

    fn on_renamed(&mut self, id: NodeId, from: &Path, to: &Path) {
        let Some(position) = self.position_of(id, from) else {
            return;
        };
        if let Err(e) = FileSystemEntry::resolve(to) {
            debug!("Skipping rename to {}: {}", to.display(), e);
            return;
        }

        let child = self.nodes[id.index()].children[position];
        let entry = self.nodes[child.index()].entry.moved_to(to);
        let name = entry.name().to_string();
        self.nodes[child.index()].entry = entry;
        self.set_display_name(child, name);
    }

    /// First child of `id` whose entry is at `path`
    fn position_of(&self, id: NodeId, path: &Path) -> Option<usize> {
        self.nodes[id.index()]
            .children
            .iter()
            .position(|&child| self.nodes[child.index()].entry.path() == path)
    }

    fn populate_in_background(&mut self, id: NodeId) {
        let path = self.nodes[id.index()].entry.path().to_path_buf();
        self.set_population(id, Population::Pending);

        debug!("Deferring enumeration of {}", path.display());
        let tx = self.tx.clone();
        rayon::spawn(move || {
            let entries = loader::load_children(&path);
            // The tree may be gone by now
            let _ = tx.send(Message::Populated { node: id, entries });
        });
    }

    fn commit_children(
        &mut self,
        id: NodeId,
        entries: io::Result<Vec<FileSystemEntry>>,
        synthetic: bool,
    ) {
        for old in mem::take(&mut self.nodes[id.index()].children) {
            self.dispose(old);
        }

        let entries = entries.unwrap_or_else(|e| {
            warn!(
                "Failed to enumerate {}: {}",
                self.nodes[id.index()].entry.path().display(),
                e
            );
            Vec::new()
        });

        let children: Vec<NodeId> = entries
            .into_iter()
            .map(|entry| self.insert_node(id, entry, synthetic))
            .collect();
        debug!("Built {} children for {}", children.len(), id);

        let node = &mut self.nodes[id.index()];
        node.has_children = !children.is_empty();
        node.children = children;
        let held = mem::take(&mut node.held_intents);
        self.set_population(id, Population::Loaded);

        self.emit(id, Property::HasChildren);
        self.emit(id, Property::Children);

        for intent in held {
            self.replay_intent(id, intent);
        }
    }

    /// Apply an intent that arrived while `id` was being enumerated
    ///
    /// The enumeration may already have seen a created entry, so a creation
    /// for a path that is already a child is skipped.
    fn replay_intent(&mut self, id: NodeId, intent: Intent) {
        if let Intent::Created(path) = &intent {
            if self.position_of(id, path).is_some() {
                trace!("Enumeration of {} already saw {}", id, path.display());
                return;
            }
        }
        self.apply_intent(id, intent);
    }

    fn insert_node(&mut self, parent: NodeId, entry: FileSystemEntry, synthetic: bool) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        let display_name = entry.name().to_string();
        self.nodes
            .push(TreeNode::new(parent, entry, display_name, synthetic));
        id
    }

    fn refresh_has_children(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.index()];
        if node.population != Population::Pending {
            node.has_children = !node.children.is_empty();
        }
        self.emit(id, Property::HasChildren);
        self.emit(id, Property::Children);
    }

    /// The root and its direct children may be enumerated in the background
    fn is_near_root(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.index()];
        node.kind == NodeKind::Root || node.parent == NodeId::ROOT
    }

    /// The node, unless it is invalid or disposed
    fn live(&self, id: NodeId) -> Option<&TreeNode> {
        self.node(id).filter(|node| !node.is_disposed)
    }

    pub(crate) fn set_population(&mut self, id: NodeId, population: Population) {
        let node = &mut self.nodes[id.index()];
        let was_updating = node.population == Population::Pending;
        node.population = population;
        if was_updating != (population == Population::Pending) {
            self.emit(id, Property::IsUpdatingChildren);
        }
    }

    fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        if mem::replace(&mut self.nodes[id.index()].is_expanded, expanded) != expanded {
            self.emit(id, Property::IsExpanded);
        }
    }

    fn set_cut(&mut self, id: NodeId, cut: bool) {
        if mem::replace(&mut self.nodes[id.index()].is_cut, cut) != cut {
            self.emit(id, Property::IsCut);
        }
    }

    fn set_display_name(&mut self, id: NodeId, name: String) {
        let node = &mut self.nodes[id.index()];
        if node.display_name != name {
            node.display_name = name;
            self.emit(id, Property::DisplayName);
        }
    }

    pub(crate) fn emit(&mut self, node: NodeId, property: Property) {
        let change = PropertyChanged { node, property };
        self.subscribers.retain(|tx| tx.send(change).is_ok());
    }
}
