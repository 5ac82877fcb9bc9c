//! Directory watches and translation of native events into intents
//!
//! A [`WatchAdapter`] belongs to exactly one node. Its native callback runs on
//! the notifier's own thread and never touches the tree: it translates each
//! raw event into [`Intent`]s and queues them, tagged with the owning node, on
//! the tree's message channel. The tree applies them later from its owner.

use crate::tree::entry::FileSystemEntry;
use crate::tree::node::NodeId;
use crate::tree::options::TreeOptions;
use anyhow::{Context, Result};
use flume::Sender;
use log::{debug, info, trace, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use path_clean::PathClean;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long a rename "from" half waits for its "to" half
///
/// Past this, the entry is taken to have left the directory.
pub const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(200);

/// A normalized change to a watched directory's immediate entries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Intent {
    Created(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// Work queued for the tree's owner
#[derive(Debug)]
pub(crate) enum Message {
    Intent {
        node: NodeId,
        intent: Intent,
    },
    Populated {
        node: NodeId,
        entries: io::Result<Vec<FileSystemEntry>>,
    },
}

/// Handle for queueing intents onto a tree's message channel
///
/// Native watches use the same channel. Hosts with their own notification
/// source can feed it through here; nothing is applied until the owner calls
/// [`WorkspaceTree::process_pending`](crate::tree::WorkspaceTree::process_pending).
#[derive(Debug, Clone)]
pub struct IntentSender {
    tx: Sender<Message>,
}

impl IntentSender {
    pub(crate) fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }

    /// Queue an intent for `node`; returns false once the tree is gone
    pub fn send(&self, node: NodeId, intent: Intent) -> bool {
        self.tx.send(Message::Intent { node, intent }).is_ok()
    }
}

/// Turns raw notify events for one directory into intents
///
/// Rename halves are paired by tracker. A "from" half that is never
/// followed by its "to" half means the entry left the directory. It is
/// reported as deleted when the next unrelated event arrives, or by
/// [`take_stale`](Self::take_stale) once it has waited long enough.
#[derive(Debug)]
pub struct IntentTranslator {
    dir: PathBuf,
    pending_from: HashMap<usize, (PathBuf, Instant)>,
    paired: HashSet<usize>,
}

impl IntentTranslator {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().clean(),
            pending_from: HashMap::new(),
            paired: HashSet::new(),
        }
    }

    /// Translate one native event, in delivery order
    pub fn translate(&mut self, event: &Event) -> SmallVec<[Intent; 2]> {
        let mut intents = SmallVec::new();
        let tracker = event.tracker();
        let paths: Vec<PathBuf> = event.paths.iter().map(|p| p.clean()).collect();

        if !self.continues_rename(event.kind, tracker) {
            self.flush_unpaired(&mut intents);
        }

        match event.kind {
            EventKind::Create(_) => intents.extend(paths.into_iter().map(Intent::Created)),
            EventKind::Remove(_) => intents.extend(paths.into_iter().map(Intent::Deleted)),
            EventKind::Modify(ModifyKind::Name(mode)) => {
                self.translate_rename(mode, tracker, paths, &mut intents)
            }
            kind => trace!("Ignoring {:?} in {}", kind, self.dir.display()),
        }

        intents
            .into_iter()
            .filter_map(|intent| self.scope(intent))
            .collect()
    }

    /// Give up on "from" halves that have waited at least `window`
    pub fn take_stale(&mut self, window: Duration) -> SmallVec<[Intent; 2]> {
        let mut stale: Vec<(usize, PathBuf, Instant)> = Vec::new();
        self.pending_from.retain(|&tracker, (path, since)| {
            if since.elapsed() >= window {
                stale.push((tracker, path.clone(), *since));
                false
            } else {
                true
            }
        });
        // Keep arrival order
        stale.sort_by_key(|&(_, _, since)| since);

        stale
            .into_iter()
            .filter_map(|(_, path, _)| self.scope(Intent::Deleted(path)))
            .collect()
    }

    /// True while some "from" half is waiting for its partner
    pub fn has_unpaired(&self) -> bool {
        !self.pending_from.is_empty()
    }

    fn continues_rename(&self, kind: EventKind, tracker: Option<usize>) -> bool {
        let is_second_half = matches!(
            kind,
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
        );
        is_second_half
            && tracker.is_some_and(|t| self.pending_from.contains_key(&t) || self.paired.contains(&t))
    }

    fn flush_unpaired(&mut self, intents: &mut SmallVec<[Intent; 2]>) {
        let mut unpaired: Vec<_> = self.pending_from.drain().map(|(_, half)| half).collect();
        unpaired.sort_by_key(|&(_, since)| since);
        intents.extend(unpaired.into_iter().map(|(path, _)| Intent::Deleted(path)));
        self.paired.clear();
    }

    fn translate_rename(
        &mut self,
        mode: RenameMode,
        tracker: Option<usize>,
        paths: Vec<PathBuf>,
        intents: &mut SmallVec<[Intent; 2]>,
    ) {
        match mode {
            RenameMode::Both => {
                let mut paths = paths.into_iter();
                let (Some(from), Some(to)) = (paths.next(), paths.next()) else {
                    return;
                };
                if let Some(t) = tracker {
                    // Already reported from the paired halves
                    if self.paired.remove(&t) {
                        return;
                    }
                    self.pending_from.remove(&t);
                }
                intents.push(Intent::Renamed { from, to });
            }
            RenameMode::From => {
                for path in paths {
                    match tracker {
                        Some(t) => {
                            self.pending_from.insert(t, (path, Instant::now()));
                        }
                        None => intents.push(Intent::Deleted(path)),
                    }
                }
            }
            RenameMode::To => {
                for to in paths {
                    let from = tracker
                        .and_then(|t| self.pending_from.remove(&t).map(|(from, _)| (t, from)));
                    match from {
                        Some((t, from)) => {
                            self.paired.insert(t);
                            intents.push(Intent::Renamed { from, to });
                        }
                        None => intents.push(Intent::Created(to)),
                    }
                }
            }
            RenameMode::Any | RenameMode::Other => {
                if paths.len() >= 2 {
                    let mut paths = paths.into_iter();
                    if let (Some(from), Some(to)) = (paths.next(), paths.next()) {
                        intents.push(Intent::Renamed { from, to });
                    }
                    return;
                }
                for path in paths {
                    if path.exists() {
                        intents.push(Intent::Created(path));
                    } else {
                        intents.push(Intent::Deleted(path));
                    }
                }
            }
        }
    }

    /// Keep only intents about immediate children of the watched directory
    fn scope(&self, intent: Intent) -> Option<Intent> {
        match intent {
            Intent::Created(path) if self.is_child(&path) => Some(Intent::Created(path)),
            Intent::Deleted(path) if self.is_child(&path) => Some(Intent::Deleted(path)),
            Intent::Renamed { from, to } => match (self.is_child(&from), self.is_child(&to)) {
                (true, true) => Some(Intent::Renamed { from, to }),
                (true, false) => Some(Intent::Deleted(from)),
                (false, true) => Some(Intent::Created(to)),
                (false, false) => None,
            },
            _ => None,
        }
    }

    fn is_child(&self, path: &Path) -> bool {
        path.parent() == Some(self.dir.as_path())
    }
}

/// A node's exclusive subscription to changes in one directory
///
/// Events are only forwarded while the adapter is enabled. Releasing it
/// disables forwarding before the native watch is torn down, so nothing
/// queued afterwards can name a released watch's node.
pub struct WatchAdapter {
    node: NodeId,
    dir: PathBuf,
    enabled: Arc<AtomicBool>,
    translator: Arc<Mutex<IntentTranslator>>,
    sender: IntentSender,
    native: Option<RecommendedWatcher>,
}

impl WatchAdapter {
    /// Create a disabled watch on `dir` whose intents are tagged with `node`
    pub(crate) fn create(
        node: NodeId,
        dir: &Path,
        sender: IntentSender,
        options: &TreeOptions,
    ) -> Result<Self> {
        let enabled = Arc::new(AtomicBool::new(false));
        let translator = Arc::new(Mutex::new(IntentTranslator::new(dir)));

        let native = if options.native_events {
            Some(Self::subscribe(
                node,
                dir,
                sender.clone(),
                enabled.clone(),
                translator.clone(),
                options.poll_interval,
            )?)
        } else {
            None
        };

        info!("Created watch on {} for {}", dir.display(), node);
        Ok(Self {
            node,
            dir: dir.to_path_buf(),
            enabled,
            translator,
            sender,
            native,
        })
    }

    fn subscribe(
        node: NodeId,
        dir: &Path,
        sender: IntentSender,
        enabled: Arc<AtomicBool>,
        translator: Arc<Mutex<IntentTranslator>>,
        poll_interval: Duration,
    ) -> Result<RecommendedWatcher> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !enabled.load(Ordering::Acquire) {
                        trace!("Dropping event for disabled watch of {}: {:?}", node, event);
                        return;
                    }
                    trace!("Received fs event for {}: {:?}", node, event);
                    let Ok(mut translator) = translator.lock() else {
                        warn!("Intent translator for {} is poisoned", node);
                        return;
                    };
                    for intent in translator.translate(&event) {
                        if !sender.send(node, intent) {
                            return;
                        }
                    }
                }
                Err(e) => warn!("File watcher error for {}: {:?}", node, e),
            },
            Config::default().with_poll_interval(poll_interval),
        )
        .context("Failed to create native watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        Ok(watcher)
    }

    /// Start forwarding intents
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// True when backed by OS change notification
    pub fn is_native(&self) -> bool {
        self.native.is_some()
    }

    /// The watched directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queue deletions for rename halves whose partner never arrived
    ///
    /// Returns the number of intents queued.
    pub(crate) fn sweep(&self, window: Duration) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let Ok(mut translator) = self.translator.lock() else {
            return 0;
        };
        let mut queued = 0;
        for intent in translator.take_stale(window) {
            debug!("Rename half for {} never paired: {:?}", self.node, intent);
            if self.sender.send(self.node, intent) {
                queued += 1;
            }
        }
        queued
    }

    /// True while a rename half is waiting for its partner
    pub(crate) fn has_unpaired(&self) -> bool {
        self.translator
            .lock()
            .map(|translator| translator.has_unpaired())
            .unwrap_or(false)
    }

    /// Stop forwarding and tear down the native watch
    pub(crate) fn release(mut self) {
        self.enabled.store(false, Ordering::Release);
        if let Some(mut watcher) = self.native.take() {
            // The directory may already be gone
            if let Err(e) = watcher.unwatch(&self.dir) {
                debug!("Unwatching {} failed: {}", self.dir.display(), e);
            }
        }
        info!("Released watch on {}", self.dir.display());
    }
}

impl fmt::Debug for WatchAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchAdapter")
            .field("dir", &self.dir)
            .field("enabled", &self.is_enabled())
            .field("native", &self.is_native())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use pretty_assertions::assert_eq;

    fn dir() -> PathBuf {
        PathBuf::from("/ws")
    }

    fn rename(mode: RenameMode) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Name(mode)))
    }

    fn translate(translator: &mut IntentTranslator, event: Event) -> Vec<Intent> {
        translator.translate(&event).into_vec()
    }

    #[test]
    fn test_create_and_remove() {
        let mut translator = IntentTranslator::new(dir());

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path("/ws/a.txt".into());
        let removed = Event::new(EventKind::Remove(RemoveKind::Any)).add_path("/ws/a.txt".into());

        assert_eq!(
            translate(&mut translator, created),
            vec![Intent::Created("/ws/a.txt".into())]
        );
        assert_eq!(
            translate(&mut translator, removed),
            vec![Intent::Deleted("/ws/a.txt".into())]
        );
    }

    #[test]
    fn test_modifications_are_ignored() {
        let mut translator = IntentTranslator::new(dir());
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("/ws/a.txt".into());

        assert!(translate(&mut translator, event).is_empty());
    }

    #[test]
    fn test_paths_outside_directory_are_dropped() {
        let mut translator = IntentTranslator::new(dir());
        let nested = Event::new(EventKind::Create(CreateKind::Any)).add_path("/ws/sub/x".into());
        let itself = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path("/ws".into());

        assert!(translate(&mut translator, nested).is_empty());
        assert!(translate(&mut translator, itself).is_empty());
    }

    #[test]
    fn test_paired_halves_report_one_rename() {
        let mut translator = IntentTranslator::new(dir());

        let from = rename(RenameMode::From).add_path("/ws/a".into()).set_tracker(7);
        let to = rename(RenameMode::To).add_path("/ws/c".into()).set_tracker(7);
        let both = rename(RenameMode::Both)
            .add_path("/ws/a".into())
            .add_path("/ws/c".into())
            .set_tracker(7);

        assert!(translate(&mut translator, from).is_empty());
        assert_eq!(
            translate(&mut translator, to),
            vec![Intent::Renamed {
                from: "/ws/a".into(),
                to: "/ws/c".into()
            }]
        );
        assert!(translate(&mut translator, both).is_empty());
    }

    #[test]
    fn test_combined_rename() {
        let mut translator = IntentTranslator::new(dir());
        let both = rename(RenameMode::Both)
            .add_path("/ws/old.txt".into())
            .add_path("/ws/new.txt".into());

        assert_eq!(
            translate(&mut translator, both),
            vec![Intent::Renamed {
                from: "/ws/old.txt".into(),
                to: "/ws/new.txt".into()
            }]
        );
    }

    #[test]
    fn test_unpaired_halves() {
        let mut translator = IntentTranslator::new(dir());

        let moved_in = rename(RenameMode::To).add_path("/ws/in.txt".into()).set_tracker(1);
        assert_eq!(
            translate(&mut translator, moved_in),
            vec![Intent::Created("/ws/in.txt".into())]
        );

        let moved_out = rename(RenameMode::From).add_path("/ws/out.txt".into()).set_tracker(2);
        assert!(translate(&mut translator, moved_out).is_empty());

        // The next unrelated event settles the dangling half
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path("/ws/x".into());
        assert_eq!(
            translate(&mut translator, created),
            vec![
                Intent::Deleted("/ws/out.txt".into()),
                Intent::Created("/ws/x".into())
            ]
        );
    }

    #[test]
    fn test_stale_from_half_becomes_deleted() {
        let mut translator = IntentTranslator::new(dir());

        let moved_out = rename(RenameMode::From).add_path("/ws/out.txt".into()).set_tracker(3);
        assert!(translate(&mut translator, moved_out).is_empty());
        assert!(translator.has_unpaired());

        assert!(translator.take_stale(Duration::from_secs(60)).is_empty());
        assert_eq!(
            translator.take_stale(Duration::ZERO).into_vec(),
            vec![Intent::Deleted("/ws/out.txt".into())]
        );
        assert!(!translator.has_unpaired());

        // A partner arriving after the window is a plain creation
        let late = rename(RenameMode::To).add_path("/ws/back.txt".into()).set_tracker(3);
        assert_eq!(
            translate(&mut translator, late),
            vec![Intent::Created("/ws/back.txt".into())]
        );
    }

    #[test]
    fn test_sweep_queues_deletion_for_owner() {
        let (tx, rx) = flume::unbounded();
        let options = TreeOptions::default().with_native_events(false);
        let adapter =
            WatchAdapter::create(NodeId::ROOT, Path::new("/ws"), IntentSender::new(tx), &options)
                .unwrap();
        let moved_out = rename(RenameMode::From).add_path("/ws/gone".into()).set_tracker(9);
        let held = adapter.translator.lock().unwrap().translate(&moved_out);
        assert!(held.is_empty());

        // Disabled adapters stay quiet
        assert_eq!(adapter.sweep(Duration::ZERO), 0);

        adapter.enable();
        assert!(adapter.has_unpaired());
        assert_eq!(adapter.sweep(Duration::ZERO), 1);
        assert!(!adapter.has_unpaired());

        match rx.try_recv().unwrap() {
            Message::Intent { node, intent } => {
                assert_eq!(node, NodeId::ROOT);
                assert_eq!(intent, Intent::Deleted("/ws/gone".into()));
            }
            other => panic!("unexpected message {:?}", other),
        }
        adapter.release();
    }

    #[test]
    fn test_rename_across_directories() {
        let mut translator = IntentTranslator::new(dir());
        let out = rename(RenameMode::Both)
            .add_path("/ws/a".into())
            .add_path("/elsewhere/a".into());
        let inward = rename(RenameMode::Both)
            .add_path("/elsewhere/b".into())
            .add_path("/ws/b".into());

        assert_eq!(
            translate(&mut translator, out),
            vec![Intent::Deleted("/ws/a".into())]
        );
        assert_eq!(
            translate(&mut translator, inward),
            vec![Intent::Created("/ws/b".into())]
        );
    }

    #[test]
    fn test_paths_are_normalised() {
        let mut translator = IntentTranslator::new("/ws/");
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path("/ws/./a.txt".into());

        assert_eq!(
            translate(&mut translator, event),
            vec![Intent::Created("/ws/a.txt".into())]
        );
    }

    #[test]
    fn test_manual_adapter_lifecycle() {
        let (tx, _rx) = flume::unbounded();
        let options = TreeOptions::default().with_native_events(false);
        let adapter =
            WatchAdapter::create(NodeId::ROOT, Path::new("/ws"), IntentSender::new(tx), &options)
                .unwrap();

        assert!(!adapter.is_enabled());
        assert!(!adapter.is_native());
        adapter.enable();
        assert!(adapter.is_enabled());
        assert_eq!(adapter.dir(), Path::new("/ws"));
        adapter.release();
    }
}
