//! The overlay filesystem: overlay paths in, nodes out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jimagefs_common::constants::PROTOCOL;
use jimagefs_common::error::Result;
use jimagefs_common::types::ImageLocation;

use crate::codec;
use crate::handle_cache::HandleCache;
use crate::memo::OnceMap;
use crate::node::Node;

static NEXT_OVERLAY_ID: AtomicU64 = AtomicU64::new(1);

/// Read-only view over the images of any number of runtime installations.
///
/// Root nodes are memoized per location in this overlay; opened images are
/// shared through the [`HandleCache`].
#[derive(Debug)]
pub struct OverlayFs {
    id: u64,
    handles: Arc<HandleCache>,
    roots: OnceMap<ImageLocation, Option<Node>>,
}

impl Default for OverlayFs {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayFs {
    /// Creates an overlay backed by the process-wide handle cache.
    #[must_use]
    pub fn new() -> Self {
        Self::with_handle_cache(HandleCache::global())
    }

    /// Creates an overlay backed by `handles`.
    #[must_use]
    pub fn with_handle_cache(handles: Arc<HandleCache>) -> Self {
        Self {
            id: NEXT_OVERLAY_ID.fetch_add(1, Ordering::Relaxed),
            handles,
            roots: OnceMap::new(),
        }
    }

    /// Identity carried by every node of this overlay.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Protocol name of this filesystem.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub const fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    /// Handle cache backing this overlay.
    #[must_use]
    pub const fn handle_cache(&self) -> &Arc<HandleCache> {
        &self.handles
    }

    /// Resolves an overlay path (`<location>!!/<relative-path>`).
    ///
    /// Returns `Ok(None)` when the location is not a readable runtime
    /// installation or the entry does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::InvalidPathFormat` if the path has no
    /// separator.
    pub fn find(&self, path: &str) -> Result<Option<Node>> {
        let (location, relative) = codec::decode(path)?;
        let Some(root) = self.root(&location) else {
            return Ok(None);
        };
        if relative.is_empty() {
            return Ok(Some(root));
        }
        Ok(root.resolve_relative(relative))
    }

    /// Root node of `location`, memoized for the life of this overlay or
    /// until [`OverlayFs::clear_roots`].
    pub fn root(&self, location: &ImageLocation) -> Option<Node> {
        self.roots.get_or_init(location, || {
            let handle = self.handles.get_or_open(location)?;
            tracing::debug!(overlay = self.id, %location, "created root node");
            Some(Node::root(self.id, location.clone(), handle))
        })
    }

    /// Does nothing: images are never rescanned.
    #[allow(clippy::unused_self)]
    pub const fn refresh(&self) {}

    /// Same as [`OverlayFs::find`]; there is nothing to refresh.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::InvalidPathFormat` if the path has no
    /// separator.
    pub fn refresh_and_find(&self, path: &str) -> Result<Option<Node>> {
        self.find(path)
    }

    /// Forgets every root node. Opened images stay in the handle cache.
    pub fn clear_roots(&self) {
        tracing::debug!(overlay = self.id, roots = self.roots.len(), "clearing root nodes");
        self.roots.clear();
    }

    /// Number of locations with a memoized root outcome.
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }
}
