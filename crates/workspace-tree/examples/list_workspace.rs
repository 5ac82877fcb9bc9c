//! CLI example that expands a workspace fully and prints its hierarchy
//!
//! Usage:
//!   cargo run --example list_workspace [path]
//!
//! If no path is provided, uses the current directory.

use std::env;
use workspace_tree::prelude::*;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let path = if args.len() > 1 { &args[1] } else { "." };

    println!("Opening workspace: {}", path);
    println!();

    // Events are never drained here, so skip the OS watches
    let options = TreeOptions::default().with_native_events(false);
    let mut tree = match WorkspaceTree::open(path, options) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error opening workspace: {:#}", e);
            std::process::exit(1);
        }
    };

    let root = tree.root();
    expand_all(&mut tree, root);

    for id in tree.walk(tree.root()) {
        let node = tree.node(id).unwrap();
        let indent = "  ".repeat(tree.depth(id));

        let icon = match node.kind() {
            NodeKind::Root => "🗂",
            NodeKind::Directory => "📁",
            NodeKind::File => "📄",
        };

        if node.entry().is_dir() {
            println!(
                "{}{} {} ({} items)",
                indent,
                icon,
                node.display_name(),
                node.children().len()
            );
        } else {
            println!("{}{} {}", indent, icon, node.display_name());
        }
    }

    let directories = tree
        .walk(tree.root())
        .filter(|&id| tree.node(id).is_some_and(|n| n.kind() == NodeKind::Directory))
        .count();
    let files = tree
        .walk(tree.root())
        .filter(|&id| tree.node(id).is_some_and(|n| n.kind() == NodeKind::File))
        .count();

    println!();
    println!("Summary:");
    println!("  Total nodes: {}", tree.node_count());
    println!("  Directories: {}", directories);
    println!("  Files: {}", files);

    tree.shutdown();
}

/// Expand a node and every directory below it
fn expand_all(tree: &mut WorkspaceTree, id: NodeId) {
    tree.expand(id);
    for child in tree.children(id).to_vec() {
        if tree.node(child).is_some_and(|n| n.entry().is_dir()) {
            expand_all(tree, child);
        }
    }
}
