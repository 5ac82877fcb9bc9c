//! One-shot enumeration of a directory's immediate entries

use crate::tree::entry::{EntryKind, FileSystemEntry};
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::Path;

/// Enumerate the immediate entries of `dir`, directories before files
///
/// Within each group entries keep the order the file system returned them in.
/// Entries that fail to enumerate individually are skipped.
///
/// # Errors
///
/// Returns an error if the directory itself cannot be read.
pub fn load_children(dir: &Path) -> io::Result<Vec<FileSystemEntry>> {
    let mut entries = Vec::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = match dir_entry {
            Ok(dir_entry) => dir_entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = dir_entry.path();
        let kind = match fs::metadata(&path) {
            Ok(metadata) => EntryKind::from_metadata(&metadata),
            // Dangling symlinks and the like still show up, as files
            Err(_) => match dir_entry.file_type() {
                Ok(file_type) if file_type.is_dir() => EntryKind::Directory,
                _ => EntryKind::File,
            },
        };

        entries.push(FileSystemEntry::new(path, kind));
    }

    debug!("Enumerated {} entries in {}", entries.len(), dir.display());
    Ok(order_entries(entries))
}

/// Move directories ahead of files without otherwise reordering
pub fn order_entries(mut entries: Vec<FileSystemEntry>) -> Vec<FileSystemEntry> {
    // sort_by_key is stable
    entries.sort_by_key(FileSystemEntry::is_file);
    entries
}
