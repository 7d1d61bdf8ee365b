//! An opened image and its native path handles.
//!
//! [`ImagePath`] is the path-level API the overlay builds on: attributes,
//! directory listing and content reads, each answered live from the opened
//! image. Every entry reports the modification time of the image file
//! itself, since the format stores no per-entry timestamps.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use jimagefs_common::constants::MODULES_FILE;
use jimagefs_common::error::{ImageFsError, Result};
use jimagefs_common::types::EntryKind;

use crate::reader::ImageReader;
use crate::tree::DirectoryIndex;

/// Parameters for opening the image of a runtime installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    /// Root of the runtime installation whose image is opened.
    pub home: PathBuf,
}

impl ImageConfig {
    /// Creates a configuration for the installation at `home`.
    #[must_use]
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Path of the modules image inside the installation.
    #[must_use]
    pub fn image_path(&self) -> PathBuf {
        self.home.join(MODULES_FILE)
    }
}

/// Entry attributes read from an opened image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    /// File or directory.
    pub kind: EntryKind,
    /// Uncompressed content size; zero for directories.
    pub size: u64,
    /// Modification time of the image file.
    pub modified: SystemTime,
}

/// An opened modules image.
#[derive(Debug)]
pub struct ImageFileSystem {
    reader: ImageReader,
    image_path: PathBuf,
    index: OnceLock<DirectoryIndex>,
}

impl ImageFileSystem {
    /// Opens the image of the installation described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be read or is malformed.
    pub fn open(config: &ImageConfig) -> Result<Self> {
        Self::open_image(config.image_path())
    }

    /// Opens the image file at `image_path` directly.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be read or is malformed.
    pub fn open_image(image_path: PathBuf) -> Result<Self> {
        let reader = ImageReader::open(&image_path)?;
        tracing::info!(
            path = %image_path.display(),
            resources = reader.header().resource_count,
            "opened modules image"
        );
        Ok(Self {
            reader,
            image_path,
            index: OnceLock::new(),
        })
    }

    /// Path of the image file backing this filesystem.
    #[must_use]
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Underlying reader.
    #[must_use]
    pub const fn reader(&self) -> &ImageReader {
        &self.reader
    }

    /// Directory index, built on first use.
    #[must_use]
    pub fn index(&self) -> &DirectoryIndex {
        self.index.get_or_init(|| DirectoryIndex::build(&self.reader))
    }

    /// Returns the root path handle.
    #[must_use]
    pub fn root(&self) -> ImagePath<'_> {
        self.path("")
    }

    /// Returns a path handle for `path` (no leading slash). The entry need
    /// not exist.
    #[must_use]
    pub fn path(&self, path: &str) -> ImagePath<'_> {
        ImagePath {
            fs: self,
            path: path.trim_matches('/').to_string(),
        }
    }
}

/// Native path handle inside an opened image.
#[derive(Debug, Clone)]
pub struct ImagePath<'a> {
    fs: &'a ImageFileSystem,
    path: String,
}

impl PartialEq for ImagePath<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.fs, other.fs) && self.path == other.path
    }
}

impl Eq for ImagePath<'_> {}

impl ImagePath<'_> {
    /// Path inside the image, empty for the root.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Last path segment, empty for the root.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Returns the handle of a child entry.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        if self.path.is_empty() {
            self.fs.path(name)
        } else {
            self.fs.path(&format!("{}/{name}", self.path))
        }
    }

    fn resource_name(&self) -> String {
        format!("/{}", self.path)
    }

    fn not_found(&self) -> ImageFsError {
        ImageFsError::read(
            self.resource_name(),
            io::Error::new(io::ErrorKind::NotFound, "no such entry in image"),
        )
    }

    /// Returns the kind of the entry, if it exists.
    #[must_use]
    pub fn kind(&self) -> Option<EntryKind> {
        self.fs.index().kind(&self.path)
    }

    /// Returns `true` if the entry exists and is a directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind() == Some(EntryKind::Directory)
    }

    /// Reads the entry's attributes.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Read` if the entry does not exist or the image
    /// file's metadata cannot be read.
    pub fn attributes(&self) -> Result<Attributes> {
        let kind = self.kind().ok_or_else(|| self.not_found())?;
        let size = match kind {
            EntryKind::Directory => 0,
            EntryKind::File => {
                self.fs
                    .reader
                    .find_location(&self.resource_name())
                    .ok_or_else(|| self.not_found())?
                    .uncompressed_size
            }
        };
        let modified = std::fs::metadata(&self.fs.image_path)
            .and_then(|m| m.modified())
            .map_err(|e| ImageFsError::read(&self.fs.image_path, e))?;
        Ok(Attributes {
            kind,
            size,
            modified,
        })
    }

    /// Lists the entries of this directory in name order.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Read` if the entry does not exist or is not a
    /// directory.
    pub fn read_dir(&self) -> Result<Vec<Self>> {
        let index = self.fs.index();
        if let Some(entries) = index.list(&self.path) {
            return Ok(entries.keys().map(|name| self.join(name)).collect());
        }
        match index.kind(&self.path) {
            Some(_) => Err(ImageFsError::read(
                self.resource_name(),
                io::Error::new(io::ErrorKind::NotADirectory, "entry is not a directory"),
            )),
            None => Err(self.not_found()),
        }
    }

    /// Reads the full content of this file.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Read` if the entry is missing or a directory,
    /// and `ImageFsError::Format` if the stored content is corrupt.
    pub fn read(&self) -> Result<Vec<u8>> {
        if self.path.is_empty() || self.is_directory() {
            return Err(ImageFsError::read(
                self.resource_name(),
                io::Error::new(io::ErrorKind::IsADirectory, "entry is a directory"),
            ));
        }
        let location = self
            .fs
            .reader
            .find_location(&self.resource_name())
            .ok_or_else(|| self.not_found())?;
        self.fs.reader.read_resource(&location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{ImageWriter, write_runtime_home};

    fn open_sample(dir: &Path) -> ImageFileSystem {
        let mut writer = ImageWriter::new();
        let _ = writer
            .add("/java.base/module-info.class", b"\xCA\xFE\xBA\xBE".to_vec())
            .add("/java.base/java/lang/Object.class", b"object".to_vec())
            .add_compressed("/java.base/java/lang/String.class", b"string".repeat(10));
        write_runtime_home(dir, &writer).expect("write home");
        ImageFileSystem::open(&ImageConfig::new(dir)).expect("open")
    }

    #[test]
    fn root_lists_modules() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = open_sample(dir.path());
        let names: Vec<String> = fs
            .root()
            .read_dir()
            .unwrap()
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        assert_eq!(names, ["java.base"]);
    }

    #[test]
    fn file_attributes_report_uncompressed_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = open_sample(dir.path());
        let attrs = fs.path("java.base/java/lang/String.class").attributes().unwrap();
        assert_eq!(attrs.kind, EntryKind::File);
        assert_eq!(attrs.size, 60);

        let dir_attrs = fs.path("java.base/java").attributes().unwrap();
        assert_eq!(dir_attrs.kind, EntryKind::Directory);
        assert_eq!(dir_attrs.size, 0);
    }

    #[test]
    fn read_returns_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = open_sample(dir.path());
        assert_eq!(fs.path("java.base/java/lang/Object.class").read().unwrap(), b"object");
        assert_eq!(
            fs.path("/java.base/java/lang/String.class").read().unwrap(),
            b"string".repeat(10)
        );
    }

    #[test]
    fn missing_entries_fail_to_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = open_sample(dir.path());
        let missing = fs.path("java.base/java/lang/Missing.class");
        assert!(missing.attributes().is_err());
        assert!(missing.read().is_err());
        assert!(missing.read_dir().is_err());
    }

    #[test]
    fn directories_and_files_reject_the_wrong_operation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = open_sample(dir.path());
        assert!(fs.path("java.base").read().is_err());
        assert!(fs.root().read().is_err());
        assert!(fs.path("java.base/module-info.class").read_dir().is_err());
    }

    #[test]
    fn join_and_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = open_sample(dir.path());
        let lang = fs.root().join("java.base").join("java").join("lang");
        assert_eq!(lang.as_str(), "java.base/java/lang");
        assert_eq!(lang.file_name(), "lang");
        assert_eq!(fs.root().file_name(), "");
        assert_eq!(lang, fs.path("java.base/java/lang"));
    }

    #[test]
    fn open_missing_image_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(ImageFileSystem::open(&ImageConfig::new(dir.path())).is_err());
    }
}
