//! # jimagefs-image
//!
//! Reader for the `modules` image of a modular runtime installation.
//!
//! Handles:
//! - **Header**: magic detection, byte order, and index geometry.
//! - **Strings**: the NUL-terminated string table and the lookup hash.
//! - **Locations**: attribute streams describing each resource.
//! - **Lookup**: perfect-hash resolution of a resource name.
//! - **Decompression**: stacked compressed resources (`zip`).
//! - **Tree**: the module/package directory index built from all locations.
//! - **Filesystem**: an opened image and its native path handles.
//! - **Writer** (feature `writer`): producing images for tests and tooling.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod decompress;
pub mod fs;
pub mod header;
pub mod location;
pub mod reader;
pub mod strings;
pub mod tree;
#[cfg(any(test, feature = "writer"))]
pub mod writer;

pub use fs::{Attributes, ImageConfig, ImageFileSystem, ImagePath};
pub use reader::ImageReader;
