//! Location attribute streams.
//!
//! Each resource is described by a run of attributes. An attribute is one
//! header byte, `kind << 3 | (length - 1)`, followed by `length` big-endian
//! value bytes. A zero header byte ends the run.

use jimagefs_common::error::{ImageFsError, Result};

use crate::strings::StringTable;

/// End of the attribute run.
pub const ATTRIBUTE_END: usize = 0;
/// String offset of the module name.
pub const ATTRIBUTE_MODULE: usize = 1;
/// String offset of the parent directory (`java/lang`).
pub const ATTRIBUTE_PARENT: usize = 2;
/// String offset of the base name without extension.
pub const ATTRIBUTE_BASE: usize = 3;
/// String offset of the extension without the dot.
pub const ATTRIBUTE_EXTENSION: usize = 4;
/// Content offset relative to the end of the index.
pub const ATTRIBUTE_OFFSET: usize = 5;
/// Stored size when compressed, zero otherwise.
pub const ATTRIBUTE_COMPRESSED: usize = 6;
/// Size of the content once decompressed.
pub const ATTRIBUTE_UNCOMPRESSED: usize = 7;
/// Number of attribute kinds.
pub const ATTRIBUTE_COUNT: usize = 8;

/// Decodes the attribute run starting at `start`.
///
/// # Errors
///
/// Returns `ImageFsError::Format` if the run is truncated or names an
/// unknown attribute kind.
pub fn decode_attributes(data: &[u8], start: usize) -> Result<[u64; ATTRIBUTE_COUNT]> {
    let mut attributes = [0u64; ATTRIBUTE_COUNT];
    let mut pos = start;
    loop {
        let byte = *data
            .get(pos)
            .ok_or_else(|| ImageFsError::format(format!("location at {start} is truncated")))?;
        let kind = usize::from(byte >> 3);
        if kind == ATTRIBUTE_END {
            return Ok(attributes);
        }
        if kind >= ATTRIBUTE_COUNT {
            return Err(ImageFsError::format(format!(
                "invalid attribute kind {kind} in location at {start}"
            )));
        }
        let length = usize::from(byte & 0x7) + 1;
        let value = data
            .get(pos + 1..pos + 1 + length)
            .ok_or_else(|| ImageFsError::format(format!("location at {start} is truncated")))?;
        attributes[kind] = value.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        pos += 1 + length;
    }
}

/// A decoded resource location with its names resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location<'a> {
    /// Module owning the resource.
    pub module: &'a str,
    /// Directory path inside the module, without surrounding slashes.
    pub parent: &'a str,
    /// File name without extension.
    pub base: &'a str,
    /// Extension without the dot.
    pub extension: &'a str,
    /// Content offset relative to the end of the index.
    pub content_offset: u64,
    /// Stored size when compressed, zero otherwise.
    pub compressed_size: u64,
    /// Size of the content once decompressed.
    pub uncompressed_size: u64,
}

impl<'a> Location<'a> {
    /// Resolves decoded attributes against the string table.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Format` if a name offset is invalid.
    pub fn resolve(attributes: &[u64; ATTRIBUTE_COUNT], strings: StringTable<'a>) -> Result<Self> {
        Ok(Self {
            module: strings.get(attributes[ATTRIBUTE_MODULE])?,
            parent: strings.get(attributes[ATTRIBUTE_PARENT])?,
            base: strings.get(attributes[ATTRIBUTE_BASE])?,
            extension: strings.get(attributes[ATTRIBUTE_EXTENSION])?,
            content_offset: attributes[ATTRIBUTE_OFFSET],
            compressed_size: attributes[ATTRIBUTE_COMPRESSED],
            uncompressed_size: attributes[ATTRIBUTE_UNCOMPRESSED],
        })
    }

    /// Returns the full resource name, `/module/parent/base.extension`.
    #[must_use]
    pub fn full_name(&self) -> String {
        let mut name = String::new();
        if !self.module.is_empty() {
            name.push('/');
            name.push_str(self.module);
            name.push('/');
        }
        if !self.parent.is_empty() {
            name.push_str(self.parent);
            name.push('/');
        }
        name.push_str(self.base);
        if !self.extension.is_empty() {
            name.push('.');
            name.push_str(self.extension);
        }
        name
    }

    /// Returns the resource path relative to the module root's parent,
    /// `module/parent/base.extension`.
    #[must_use]
    pub fn relative_name(&self) -> String {
        let full = self.full_name();
        full.strip_prefix('/').map_or_else(|| full.clone(), str::to_owned)
    }

    /// Returns `true` if the content is stored compressed.
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.compressed_size != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_variable_length_values() {
        // MODULE=1 (1 byte), OFFSET=0x0102 (2 bytes), END
        let data: [u8; 6] = [1 << 3, 0x01, (5 << 3) | 1, 0x01, 0x02, 0x00];
        let attributes = decode_attributes(&data, 0).expect("decode");
        assert_eq!(attributes[ATTRIBUTE_MODULE], 1);
        assert_eq!(attributes[ATTRIBUTE_OFFSET], 0x0102);
        assert_eq!(attributes[ATTRIBUTE_BASE], 0);
    }

    #[test]
    fn decode_rejects_truncated_run() {
        let data: [u8; 2] = [(5 << 3) | 3, 0x01];
        assert!(decode_attributes(&data, 0).is_err());
        assert!(decode_attributes(&[], 0).is_err());
    }

    #[test]
    fn full_name_joins_present_parts() {
        let location = Location {
            module: "java.base",
            parent: "java/lang",
            base: "Object",
            extension: "class",
            content_offset: 0,
            compressed_size: 0,
            uncompressed_size: 10,
        };
        assert_eq!(location.full_name(), "/java.base/java/lang/Object.class");
        assert_eq!(location.relative_name(), "java.base/java/lang/Object.class");
        assert!(!location.is_compressed());
    }

    #[test]
    fn full_name_without_parent_or_extension() {
        let location = Location {
            module: "java.base",
            parent: "",
            base: "LICENSE",
            extension: "",
            content_offset: 0,
            compressed_size: 0,
            uncompressed_size: 0,
        };
        assert_eq!(location.full_name(), "/java.base/LICENSE");
    }
}
