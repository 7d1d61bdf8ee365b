//! Process-wide cache of opened images.
//!
//! Opening an image is expensive and the resources behind an opened image
//! (and the loader used to open it, when one is needed) are never released.
//! The cache therefore opens each location at most once per process and
//! remembers absence as well as success. Handles and loaders are leaked on
//! purpose; their number is bounded by the number of distinct locations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use jimagefs_common::constants::{MARKER_FILE, MODULES_FILE};
use jimagefs_common::error::{ImageFsError, Result};
use jimagefs_common::types::ImageLocation;
use jimagefs_image::{ImageConfig, ImageFileSystem, ImagePath};

use crate::host::OpenStrategy;
use crate::memo::OnceMap;

static GLOBAL: OnceLock<Arc<HandleCache>> = OnceLock::new();

/// Returns `true` if `home` looks like a modular runtime installation.
#[must_use]
pub fn is_modular_runtime(home: &Path) -> bool {
    home.join(MARKER_FILE).is_file()
}

/// Loader dedicated to one installation, used when the host has no
/// built-in image reader. Its search path holds only the marker file.
#[derive(Debug)]
pub struct FormatLoader {
    search_path: Vec<PathBuf>,
}

impl FormatLoader {
    /// Creates a loader rooted at the installation's marker file.
    #[must_use]
    pub fn new(marker: PathBuf) -> Self {
        Self {
            search_path: vec![marker],
        }
    }

    /// Entries the loader resolves from.
    #[must_use]
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Opens the image that sits next to the marker file.
    ///
    /// # Errors
    ///
    /// Returns an error if the search path is empty or the image cannot be
    /// opened.
    pub fn open_image(&self) -> Result<ImageFileSystem> {
        let marker = self
            .search_path
            .first()
            .ok_or_else(|| ImageFsError::format("loader has an empty search path"))?;
        let file_name = Path::new(MODULES_FILE)
            .file_name()
            .ok_or_else(|| ImageFsError::format("modules file has no name"))?;
        let image = marker
            .parent()
            .map_or_else(|| PathBuf::from(file_name), |dir| dir.join(file_name));
        ImageFileSystem::open_image(image)
    }
}

/// Opened image plus the loader that opened it, if any.
///
/// Both live for the rest of the process.
#[derive(Debug, Clone, Copy)]
pub struct BackingHandle {
    fs: &'static ImageFileSystem,
    loader: Option<&'static FormatLoader>,
}

impl BackingHandle {
    /// The opened image.
    #[must_use]
    pub const fn fs(&self) -> &'static ImageFileSystem {
        self.fs
    }

    /// Loader used to open the image, `None` with a host-provided reader.
    #[must_use]
    pub const fn loader(&self) -> Option<&'static FormatLoader> {
        self.loader
    }

    /// Root path handle of the image.
    #[must_use]
    pub fn root(&self) -> ImagePath<'static> {
        self.fs.root()
    }
}

impl PartialEq for BackingHandle {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.fs, other.fs)
    }
}

impl Eq for BackingHandle {}

/// Memoizes one [`BackingHandle`] (or its absence) per location.
#[derive(Debug)]
pub struct HandleCache {
    strategy: OpenStrategy,
    handles: OnceMap<ImageLocation, Option<BackingHandle>>,
    opens: AtomicUsize,
    loaders: AtomicUsize,
}

impl HandleCache {
    /// Creates an empty cache using `strategy` for every open.
    #[must_use]
    pub fn new(strategy: OpenStrategy) -> Self {
        Self {
            strategy,
            handles: OnceMap::new(),
            opens: AtomicUsize::new(0),
            loaders: AtomicUsize::new(0),
        }
    }

    /// Process-wide cache, using the strategy of the installed host
    /// environment.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| {
            let strategy = OpenStrategy::detect();
            tracing::debug!(?strategy, "creating process-wide handle cache");
            Arc::new(Self::new(strategy))
        }))
    }

    /// Strategy used to open images.
    #[must_use]
    pub const fn strategy(&self) -> OpenStrategy {
        self.strategy
    }

    /// Returns the handle for `location`, opening the image on first use.
    ///
    /// `None` means the location is not a modular runtime installation or
    /// its image could not be opened. Either outcome is remembered for the
    /// rest of the process.
    pub fn get_or_open(&self, location: &ImageLocation) -> Option<BackingHandle> {
        self.handles.get_or_init(location, || self.open(location))
    }

    fn open(&self, location: &ImageLocation) -> Option<BackingHandle> {
        let home = location.as_path();
        let marker = home.join(MARKER_FILE);
        if !marker.is_file() {
            tracing::debug!(%location, "no runtime image marker");
            return None;
        }

        let _ = self.opens.fetch_add(1, Ordering::SeqCst);
        let opened = match self.strategy {
            OpenStrategy::HostProvided => {
                ImageFileSystem::open(&ImageConfig::new(home)).map(|fs| (fs, None))
            }
            OpenStrategy::BootstrapLoader => {
                // Leaked before the open so a failed open still accounts for it.
                let loader: &'static FormatLoader = Box::leak(Box::new(FormatLoader::new(marker)));
                let _ = self.loaders.fetch_add(1, Ordering::SeqCst);
                loader.open_image().map(|fs| (fs, Some(loader)))
            }
        };

        match opened {
            Ok((fs, loader)) => {
                let fs: &'static ImageFileSystem = Box::leak(Box::new(fs));
                tracing::info!(
                    %location,
                    strategy = ?self.strategy,
                    "cached runtime image handle"
                );
                Some(BackingHandle { fs, loader })
            }
            Err(e) => {
                tracing::warn!(%location, error = %e, "failed to open runtime image");
                None
            }
        }
    }

    /// Number of image opens attempted.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of loaders created and kept alive.
    pub fn loader_count(&self) -> usize {
        self.loaders.load(Ordering::SeqCst)
    }

    /// Number of locations with a memoized outcome.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if no location has been looked up yet.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use jimagefs_image::writer::{ImageWriter, write_runtime_home};

    use super::*;

    fn runtime_home() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = ImageWriter::new();
        let _ = writer.add("/java.base/module-info.class", b"\xCA\xFE\xBA\xBE".to_vec());
        write_runtime_home(dir.path(), &writer).expect("write home");
        dir
    }

    fn location(dir: &tempfile::TempDir) -> ImageLocation {
        ImageLocation::new(dir.path().to_string_lossy())
    }

    #[test]
    fn host_provided_opens_without_loader() {
        let home = runtime_home();
        let cache = HandleCache::new(OpenStrategy::HostProvided);
        let handle = cache.get_or_open(&location(&home)).expect("handle");
        assert!(handle.loader().is_none());
        assert!(handle.root().is_directory());
        assert_eq!(cache.open_count(), 1);
        assert_eq!(cache.loader_count(), 0);
    }

    #[test]
    fn bootstrap_loader_is_created_once_per_location() {
        let home = runtime_home();
        let cache = HandleCache::new(OpenStrategy::BootstrapLoader);
        let first = cache.get_or_open(&location(&home)).expect("handle");
        let second = cache.get_or_open(&location(&home)).expect("handle");
        assert_eq!(first, second);
        let loader = first.loader().expect("loader");
        assert_eq!(loader.search_path(), [home.path().join(MARKER_FILE)]);
        assert_eq!(cache.open_count(), 1);
        assert_eq!(cache.loader_count(), 1);
    }

    #[test]
    fn missing_marker_is_cached_absence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = HandleCache::new(OpenStrategy::HostProvided);
        assert!(cache.get_or_open(&location(&dir)).is_none());

        let mut writer = ImageWriter::new();
        let _ = writer.add("/java.base/module-info.class", b"m".to_vec());
        write_runtime_home(dir.path(), &writer).expect("write home");
        assert!(cache.get_or_open(&location(&dir)).is_none());
        assert_eq!(cache.open_count(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unreadable_image_is_cached_absence() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("lib")).expect("mkdir");
        std::fs::write(dir.path().join(MARKER_FILE), b"PK").expect("marker");
        std::fs::write(dir.path().join(MODULES_FILE), b"garbage").expect("image");

        let cache = HandleCache::new(OpenStrategy::HostProvided);
        assert!(cache.get_or_open(&location(&dir)).is_none());
        assert!(cache.get_or_open(&location(&dir)).is_none());
        assert_eq!(cache.open_count(), 1);
    }

    #[test]
    fn failed_bootstrap_open_still_keeps_its_loader() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("lib")).expect("mkdir");
        std::fs::write(dir.path().join(MARKER_FILE), b"PK").expect("marker");

        let cache = HandleCache::new(OpenStrategy::BootstrapLoader);
        assert!(cache.get_or_open(&location(&dir)).is_none());
        assert_eq!(cache.loader_count(), 1);
    }

    #[test]
    fn modular_runtime_detection() {
        let home = runtime_home();
        assert!(is_modular_runtime(home.path()));
        let empty = tempfile::tempdir().expect("tempdir");
        assert!(!is_modular_runtime(empty.path()));
    }
}
