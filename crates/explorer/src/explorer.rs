//! Terminal explorer for a live workspace tree
//!
//! Usage:
//!   explorer [path] [--defer] [--once]
//!
//! Prints the expanded root, then keeps reporting property changes as the
//! workspace changes on disk. `--once` prints the tree and exits.

use anyhow::Result;
use log::info;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use workspace_tree::prelude::*;

struct Args {
    path: PathBuf,
    defer: bool,
    once: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        path: PathBuf::from("."),
        defer: false,
        once: false,
    };
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--defer" => args.defer = true,
            "--once" => args.once = true,
            _ => args.path = PathBuf::from(arg),
        }
    }
    args
}

fn main() -> Result<()> {
    env_logger::init();
    let args = parse_args();

    let options = TreeOptions::default()
        .with_defer_population(args.defer)
        .with_native_events(!args.once);
    let mut tree = WorkspaceTree::open(&args.path, options)?;
    let changes = tree.subscribe();
    let root = tree.root();

    tree.expand(root);
    while tree.node(root).is_some_and(TreeNode::is_updating_children) {
        tree.wait_for_messages(Duration::from_millis(100));
    }
    print_tree(&tree);

    if args.once {
        tree.shutdown();
        return Ok(());
    }

    let base = tree
        .node(root)
        .map(|n| n.entry().path().to_path_buf())
        .unwrap_or_default();
    info!("Watching {} (Ctrl-C to stop)", base.display());

    // Drop everything reported while building the initial view
    changes.drain().count();

    loop {
        if tree.wait_for_messages(Duration::from_millis(250)) == 0 {
            continue;
        }
        for change in changes.try_iter() {
            report(&tree, &base, change);
        }
    }
}

fn print_tree(tree: &WorkspaceTree) {
    for id in tree.walk(tree.root()) {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let marker = if node.entry().is_dir() { "/" } else { "" };
        println!(
            "{}{}{}",
            "  ".repeat(tree.depth(id)),
            node.display_name(),
            marker
        );
    }
}

fn report(tree: &WorkspaceTree, base: &Path, change: PropertyChanged) {
    let Some(node) = tree.node(change.node) else {
        return;
    };
    let path = pathdiff::diff_paths(node.entry().path(), base)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));

    match change.property {
        Property::Children => {
            let names: Vec<&str> = node
                .children()
                .iter()
                .filter_map(|&c| tree.node(c))
                .map(TreeNode::display_name)
                .collect();
            println!("{}: children [{}]", path.display(), names.join(", "));
        }
        Property::DisplayName => {
            println!("{}: renamed to {}", path.display(), node.display_name());
        }
        Property::IsCut => println!("{}: removed", path.display()),
        property => println!("{}: {} changed", path.display(), property),
    }
}
