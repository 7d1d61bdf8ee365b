//! Unified error types for the jimagefs workspace.
//!
//! Structural absence (an invalid image location, a missing entry, an
//! unreadable directory) is never an error: it surfaces as `None` or as an
//! empty listing. Only malformed input, content-read faults and write
//! attempts reach the caller through [`ImageFsError`].

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ImageFsError {
    /// An overlay path does not contain the image separator.
    #[error("overlay path must contain the `{separator}` separator: {path}")]
    InvalidPathFormat {
        /// The offending path.
        path: String,
        /// The separator that was expected.
        separator: &'static str,
    },

    /// A write operation was attempted on the read-only overlay.
    #[error("{operation} is not supported on read-only entry {path}")]
    Unsupported {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Overlay path of the entry.
        path: String,
    },

    /// Reading content from the image or the host filesystem failed.
    #[error("read failed at {path}: {source}")]
    Read {
        /// Path (host path or overlay path) that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A host filesystem operation outside content reads failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The image file is malformed or uses an unsupported feature.
    #[error("malformed image: {message}")]
    Format {
        /// Description of the defect.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl ImageFsError {
    /// Builds a [`ImageFsError::Format`] from any displayable message.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Builds a [`ImageFsError::Read`] for the given path.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Builds a [`ImageFsError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors caused by a write attempt.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ImageFsError>;
