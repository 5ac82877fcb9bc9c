use std::fs;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use workspace_tree::prelude::*;

fn deferred_workspace() -> (TempDir, WorkspaceTree) {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("src/deep")).unwrap();
    fs::write(temp.path().join("src/lib.rs"), "").unwrap();
    fs::write(temp.path().join("README.md"), "").unwrap();

    let options = TreeOptions::default()
        .with_native_events(false)
        .with_defer_population(true);
    let tree = WorkspaceTree::open(temp.path(), options).unwrap();
    (temp, tree)
}

/// Pump messages until `done` holds or five seconds pass
fn pump_until(tree: &mut WorkspaceTree, done: impl Fn(&WorkspaceTree) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done(tree) {
            return true;
        }
        tree.wait_for_messages(Duration::from_millis(50));
    }
    done(tree)
}

#[test]
fn test_root_population_is_deferred() {
    let (_temp, mut tree) = deferred_workspace();
    let root = tree.root();
    let changes = tree.subscribe();

    tree.expand(root);

    let node = tree.node(root).unwrap();
    assert!(node.is_updating_children());
    assert!(node.has_children());
    assert!(node.is_watched());

    assert!(pump_until(&mut tree, |t| t.node(t.root()).unwrap().is_populated()));

    let node = tree.node(root).unwrap();
    assert!(!node.is_updating_children());
    assert_eq!(node.children().len(), 2);

    let updating: Vec<_> = changes
        .try_iter()
        .filter(|c| c.property == Property::IsUpdatingChildren)
        .collect();
    assert_eq!(updating.len(), 2);
}

#[test]
fn test_only_near_root_levels_are_deferred() {
    let (_temp, mut tree) = deferred_workspace();
    let root = tree.root();
    tree.expand(root);
    assert!(pump_until(&mut tree, |t| t.node(t.root()).unwrap().is_populated()));

    let src = tree.children(root)[0];
    tree.expand(src);
    assert!(tree.node(src).unwrap().is_updating_children());
    assert!(pump_until(&mut tree, |t| t.node(src).unwrap().is_populated()));

    // Second level builds synchronously
    let deep = tree.children(src)[0];
    tree.expand(deep);
    let node = tree.node(deep).unwrap();
    assert!(node.is_populated());
    assert!(!node.is_updating_children());
}

#[test]
fn test_repeated_expand_while_pending_starts_once() {
    let (_temp, mut tree) = deferred_workspace();
    let root = tree.root();

    tree.expand(root);
    tree.expand(root);

    assert!(pump_until(&mut tree, |t| t.node(t.root()).unwrap().is_populated()));
    // Give a stray second result time to arrive
    tree.wait_for_messages(Duration::from_millis(200));
    assert_eq!(tree.children(root).len(), 2);
}

#[test]
fn test_disposal_mid_population_drops_result() {
    let (_temp, mut tree) = deferred_workspace();
    let root = tree.root();
    let before = tree.node_count();

    tree.expand(root);
    tree.dispose(root);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut applied = 0;
    while applied == 0 && Instant::now() < deadline {
        applied += tree.wait_for_messages(Duration::from_millis(50));
    }

    assert_eq!(applied, 1);
    assert_eq!(tree.node_count(), before);
    let node = tree.node(root).unwrap();
    assert!(node.is_disposed());
    assert!(!node.is_updating_children());
    assert!(tree.children(root).is_empty());
}

#[test]
fn test_disposal_mid_population_clears_loading_flag() {
    let (_temp, mut tree) = deferred_workspace();
    let root = tree.root();
    let changes = tree.subscribe();

    tree.expand(root);
    tree.dispose(root);

    assert!(!tree.node(root).unwrap().is_updating_children());
    let updating = changes
        .try_iter()
        .filter(|c| c.property == Property::IsUpdatingChildren)
        .count();
    // Set by expand, cleared by dispose
    assert_eq!(updating, 2);
}

#[test]
fn test_created_while_pending_survives_commit() {
    let (temp, mut tree) = deferred_workspace();
    let root = tree.root();

    tree.expand(root);
    assert!(tree.node(root).unwrap().is_updating_children());

    let ws = tree.node(root).unwrap().entry().path().to_path_buf();
    fs::write(temp.path().join("late.txt"), "").unwrap();
    tree.apply_intent(root, Intent::Created(ws.join("late.txt")));
    // Held back until the enumeration lands
    assert!(tree.children(root).is_empty());

    assert!(pump_until(&mut tree, |t| t.node(t.root()).unwrap().is_populated()));

    let late: Vec<NodeId> = tree
        .children(root)
        .iter()
        .copied()
        .filter(|&c| tree.node(c).unwrap().display_name() == "late.txt")
        .collect();
    assert_eq!(late.len(), 1);
    assert!(!tree.node(late[0]).unwrap().is_disposed());
    assert_eq!(tree.children(root).len(), 3);
}

#[test]
fn test_deleted_while_pending_survives_commit() {
    let (temp, mut tree) = deferred_workspace();
    let root = tree.root();

    tree.expand(root);
    let ws = tree.node(root).unwrap().entry().path().to_path_buf();
    fs::remove_file(temp.path().join("README.md")).unwrap();
    tree.apply_intent(root, Intent::Deleted(ws.join("README.md")));

    assert!(pump_until(&mut tree, |t| t.node(t.root()).unwrap().is_populated()));

    let names: Vec<&str> = tree
        .children(root)
        .iter()
        .map(|&c| tree.node(c).unwrap().display_name())
        .collect();
    assert_eq!(names, vec!["src"]);
}
