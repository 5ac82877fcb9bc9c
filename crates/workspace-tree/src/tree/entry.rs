//! File-system entries backing tree nodes

use derive_more::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Whether an entry is a file or a directory
///
/// Anything that is not a directory (regular files, sockets, broken links)
/// is treated as a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntryKind {
    #[display(fmt = "File")]
    File,
    #[display(fmt = "Directory")]
    Directory,
}

impl EntryKind {
    /// Classify from metadata, following symlinks
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

/// Identity, leaf name and kind of one file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemEntry {
    path: PathBuf,
    name: String,
    kind: EntryKind,
}

impl FileSystemEntry {
    /// Create an entry without touching the disk
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        let path = path.into();
        let name = leaf_name(&path);
        Self { path, name, kind }
    }

    /// Resolve a path against the file system as it is right now
    ///
    /// # Errors
    ///
    /// Fails with `io::ErrorKind::NotFound` when the path no longer exists.
    pub fn resolve(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        Ok(Self::new(path, EntryKind::from_metadata(&metadata)))
    }

    /// The same kind of entry at another path
    pub fn moved_to(&self, path: impl Into<PathBuf>) -> Self {
        Self::new(path, self.kind)
    }

    /// Absolute path of the entry
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leaf name (last path component)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

fn leaf_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_file_and_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "hi").unwrap();
        fs::create_dir(temp.path().join("docs")).unwrap();

        let file = FileSystemEntry::resolve(temp.path().join("notes.txt")).unwrap();
        assert_eq!(file.kind(), EntryKind::File);
        assert_eq!(file.name(), "notes.txt");

        let dir = FileSystemEntry::resolve(temp.path().join("docs")).unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.name(), "docs");
    }

    #[test]
    fn test_resolve_missing_path() {
        let temp = TempDir::new().unwrap();
        let err = FileSystemEntry::resolve(temp.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_moved_to_keeps_kind() {
        let entry = FileSystemEntry::new("/ws/a", EntryKind::Directory);
        let moved = entry.moved_to("/ws/c");

        assert_eq!(moved.path(), Path::new("/ws/c"));
        assert_eq!(moved.name(), "c");
        assert!(moved.is_dir());
    }
}
