//! # jimagefs-vfs
//!
//! Read-only virtual filesystem overlay over the `modules` image of a
//! modular runtime installation.
//!
//! Overlay paths have the form `<image-location>!!/<relative-path>`. The
//! [`OverlayFs`] resolves them to [`Node`]s, opening each image at most once
//! per process through the [`HandleCache`].
//!
//! ```no_run
//! use jimagefs_vfs::OverlayFs;
//!
//! let fs = OverlayFs::new();
//! if let Some(node) = fs.find("/opt/jdk17!!/java.base/module-info.class")? {
//!     let bytes = node.read_bytes()?;
//!     assert_eq!(bytes.len() as u64, node.size());
//! }
//! # Ok::<(), jimagefs_common::error::ImageFsError>(())
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod archive;
pub mod codec;
pub mod filesystem;
pub mod handle_cache;
pub mod host;
pub mod memo;
pub mod node;

pub use filesystem::OverlayFs;
pub use handle_cache::{BackingHandle, HandleCache};
pub use host::{HostEnvironment, OpenStrategy};
pub use node::Node;
