//! Entries of an opened image as exposed by the overlay.
//!
//! A [`Node`] is a cheap, shareable handle. Children are listed once and
//! kept; size, modification time and the directory flag are read from the
//! image on every call. Parents are referenced weakly and rebuilt from the
//! path when the parent node is gone.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Cursor, Write};
use std::sync::{Arc, OnceLock, Weak};

use chrono::{DateTime, Utc};
use jimagefs_common::error::{ImageFsError, Result};
use jimagefs_common::types::ImageLocation;
use jimagefs_image::ImagePath;

use crate::codec;
use crate::handle_cache::BackingHandle;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One file or directory of one opened image.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

struct NodeInner {
    overlay: u64,
    location: ImageLocation,
    handle: BackingHandle,
    path: ImagePath<'static>,
    parent: Option<Weak<NodeInner>>,
    children: OnceLock<Vec<Node>>,
}

impl Node {
    pub(crate) fn root(overlay: u64, location: ImageLocation, handle: BackingHandle) -> Self {
        Self::build(overlay, location, handle, handle.root(), None)
    }

    fn build(
        overlay: u64,
        location: ImageLocation,
        handle: BackingHandle,
        path: ImagePath<'static>,
        parent: Option<Weak<NodeInner>>,
    ) -> Self {
        Self(Arc::new(NodeInner {
            overlay,
            location,
            handle,
            path,
            parent,
            children: OnceLock::new(),
        }))
    }

    fn child(&self, path: ImagePath<'static>) -> Self {
        Self::build(
            self.0.overlay,
            self.0.location.clone(),
            self.0.handle,
            path,
            Some(Arc::downgrade(&self.0)),
        )
    }

    /// Last segment of the internal path; empty for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.path.file_name()
    }

    /// Path inside the image, `/`-separated without a leading slash.
    #[must_use]
    pub fn internal_path(&self) -> &str {
        self.0.path.as_str()
    }

    /// Installation this node belongs to.
    #[must_use]
    pub fn location(&self) -> &ImageLocation {
        &self.0.location
    }

    /// Identity of the overlay that produced this node.
    #[must_use]
    pub fn overlay_id(&self) -> u64 {
        self.0.overlay
    }

    /// Full overlay path: `<location>!!/<internal path>`.
    #[must_use]
    pub fn path(&self) -> String {
        codec::encode(&self.0.location, self.internal_path())
    }

    /// Returns `true` if the entry is a directory; `false` if it is a file
    /// or cannot be read.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.0.path.is_directory()
    }

    /// Content size in bytes; zero for directories and unreadable entries.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.0.path.attributes().map_or(0, |attrs| attrs.size)
    }

    /// Last modification time, or the Unix epoch if it cannot be read.
    #[must_use]
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.0
            .path
            .attributes()
            .map_or(DateTime::UNIX_EPOCH, |attrs| DateTime::<Utc>::from(attrs.modified))
    }

    /// Always `0`: image entries never change.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub const fn modification_stamp(&self) -> u64 {
        0
    }

    /// Always `true`.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        true
    }

    /// Always `false`.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        false
    }

    /// Does nothing: image content is immutable.
    #[allow(clippy::unused_self)]
    pub const fn refresh(&self) {}

    /// Entries of this directory.
    ///
    /// Listed on first call and kept for the life of the node. A file or an
    /// unreadable directory has no children, and that outcome is kept too.
    pub fn children(&self) -> &[Self] {
        self.0.children.get_or_init(|| match self.0.path.read_dir() {
            Ok(paths) => {
                tracing::debug!(path = %self.path(), count = paths.len(), "listed children");
                paths.into_iter().map(|path| self.child(path)).collect()
            }
            Err(e) => {
                tracing::debug!(path = %self.path(), error = %e, "no children");
                Vec::new()
            }
        })
    }

    /// Child with the given name.
    #[must_use]
    pub fn find_child(&self, name: &str) -> Option<Self> {
        self.children().iter().find(|c| c.name() == name).cloned()
    }

    /// Walks `path` from this node.
    ///
    /// Empty segments are skipped, `.` stays in place and `..` moves to the
    /// parent. The walk stops at the first missing segment. An empty path
    /// resolves to this node.
    #[must_use]
    pub fn resolve_relative(&self, path: &str) -> Option<Self> {
        let mut current = self.clone();
        for segment in path.split('/') {
            current = match segment {
                "" | "." => current,
                ".." => current.parent()?,
                name => current.find_child(name)?,
            };
        }
        Some(current)
    }

    /// Parent directory; `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let weak = self.0.parent.as_ref()?;
        if let Some(inner) = weak.upgrade() {
            return Some(Self(inner));
        }
        let internal = self.internal_path();
        let parent_path = internal.rsplit_once('/').map_or("", |(parent, _)| parent);
        let fs = self.0.handle.fs();
        let grandparent = (!parent_path.is_empty()).then(Weak::new);
        Some(Self::build(
            self.0.overlay,
            self.0.location.clone(),
            self.0.handle,
            fs.path(parent_path),
            grandparent,
        ))
    }

    /// Full content of this file.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Read` if the entry is a directory or missing,
    /// and `ImageFsError::Format` if the stored content is corrupt.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        self.0.path.read()
    }

    /// Stream over the content of this file, positioned after a leading
    /// UTF-8 byte-order mark if there is one.
    ///
    /// # Errors
    ///
    /// Same as [`Node::read_bytes`].
    pub fn open_read_stream(&self) -> Result<Cursor<Vec<u8>>> {
        let bytes = self.read_bytes()?;
        let skip = if bytes.starts_with(UTF8_BOM) {
            UTF8_BOM.len() as u64
        } else {
            0
        };
        let mut stream = Cursor::new(bytes);
        stream.set_position(skip);
        Ok(stream)
    }

    /// Always fails: image entries are read-only.
    ///
    /// # Errors
    ///
    /// Always returns `ImageFsError::Unsupported`.
    pub fn open_write_stream(&self) -> Result<Box<dyn Write + Send>> {
        Err(self.unsupported("open_write_stream"))
    }

    /// Always fails: image entries are read-only.
    ///
    /// # Errors
    ///
    /// Always returns `ImageFsError::Unsupported`.
    pub fn write_bytes(&self, _content: &[u8]) -> Result<()> {
        Err(self.unsupported("write_bytes"))
    }

    fn unsupported(&self, operation: &'static str) -> ImageFsError {
        ImageFsError::Unsupported {
            operation,
            path: self.path(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.0.overlay == other.0.overlay
            && self.0.location == other.0.location
            && self.internal_path() == other.internal_path()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.overlay.hash(state);
        self.0.location.hash(state);
        self.internal_path().hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("overlay", &self.0.overlay)
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
