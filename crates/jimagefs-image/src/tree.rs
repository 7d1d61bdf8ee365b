//! Directory index over the resources of an image.
//!
//! The image only records resource names. Directories (modules and the
//! package hierarchy below them) are derived from those names. Paths are
//! `/`-separated without a leading slash; the root is the empty string.

use std::collections::BTreeMap;

use jimagefs_common::constants::{MODULES_TREE, PACKAGES_TREE};
use jimagefs_common::types::EntryKind;

use crate::reader::ImageReader;

/// Directory listing of a whole image.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    directories: BTreeMap<String, BTreeMap<String, EntryKind>>,
}

impl DirectoryIndex {
    /// Builds the index from every location of the image.
    ///
    /// Malformed locations and the synthetic `modules`/`packages` trees are
    /// skipped.
    #[must_use]
    pub fn build(reader: &ImageReader) -> Self {
        let mut index = Self::default();
        let _ = index.directories.insert(String::new(), BTreeMap::new());
        let mut skipped = 0usize;
        for location in reader.locations() {
            match location {
                Ok(location) => {
                    if location.module.is_empty()
                        || location.module == MODULES_TREE
                        || location.module == PACKAGES_TREE
                    {
                        continue;
                    }
                    index.insert_file(&location.relative_name());
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(error = %e, "skipping malformed location");
                }
            }
        }
        tracing::debug!(
            directories = index.directories.len(),
            skipped,
            "built image directory index"
        );
        index
    }

    fn insert_file(&mut self, path: &str) {
        let mut kind = EntryKind::File;
        let mut current = path;
        loop {
            let (parent, name) = current.rsplit_once('/').unwrap_or(("", current));
            let entries = self.directories.entry(parent.to_string()).or_default();
            let known = entries.contains_key(name);
            let _ = entries.entry(name.to_string()).or_insert(kind);
            if known || parent.is_empty() {
                break;
            }
            kind = EntryKind::Directory;
            current = parent;
        }
    }

    /// Returns the kind of the entry at `path`, if it exists.
    #[must_use]
    pub fn kind(&self, path: &str) -> Option<EntryKind> {
        if self.directories.contains_key(path) {
            return Some(EntryKind::Directory);
        }
        let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
        self.directories.get(parent)?.get(name).copied()
    }

    /// Returns the sorted entries of the directory at `path`.
    #[must_use]
    pub fn list(&self, path: &str) -> Option<&BTreeMap<String, EntryKind>> {
        self.directories.get(path)
    }

    /// Number of directories, the root included.
    #[must_use]
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }
}
