//! Random-access reader over a whole modules image held in memory.

use std::cmp::Ordering;
use std::path::Path;

use jimagefs_common::constants::HASH_MULTIPLIER;
use jimagefs_common::error::{ImageFsError, Result};

use crate::decompress;
use crate::header::ImageHeader;
use crate::location::{Location, decode_attributes};
use crate::strings::{StringTable, hash_code, slot};

/// Parsed modules image.
#[derive(Debug)]
pub struct ImageReader {
    data: Vec<u8>,
    header: ImageHeader,
}

impl ImageReader {
    /// Reads and validates the image file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Read` if the file cannot be read and
    /// `ImageFsError::Format` if it is not a valid image.
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "reading modules image");
        let data = std::fs::read(path).map_err(|e| ImageFsError::read(path, e))?;
        Self::from_bytes(data)
    }

    /// Validates an image already held in memory.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Format` if the header is invalid or the index
    /// extends past the end of the data.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let header = ImageHeader::parse(&data)?;
        if data.len() < header.index_size() {
            return Err(ImageFsError::format(format!(
                "index needs {} bytes, image has {}",
                header.index_size(),
                data.len()
            )));
        }
        Ok(Self { data, header })
    }

    /// Returns the parsed header.
    #[must_use]
    pub const fn header(&self) -> &ImageHeader {
        &self.header
    }

    /// Returns the string table.
    #[must_use]
    pub fn strings(&self) -> StringTable<'_> {
        StringTable::new(&self.data[self.header.strings_offset()..self.header.index_size()])
    }

    fn redirect(&self, index: usize) -> Option<i32> {
        self.header
            .order
            .read_i32(&self.data, self.header.redirect_offset() + index * 4)
    }

    fn location_offset(&self, index: usize) -> Option<u32> {
        self.header
            .order
            .read_u32(&self.data, self.header.offsets_offset() + index * 4)
    }

    /// Decodes the location stored at `offset` in the attribute stream.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Format` if the location is malformed.
    pub fn location_at(&self, offset: u32) -> Result<Location<'_>> {
        if offset >= self.header.locations_size {
            return Err(ImageFsError::format(format!(
                "location offset {offset} out of range"
            )));
        }
        let locations = &self.data[self.header.locations_offset()..self.header.strings_offset()];
        let attributes = decode_attributes(locations, offset as usize)?;
        Location::resolve(&attributes, self.strings())
    }

    /// Looks up a resource by its full name (`/module/path/file.ext`).
    ///
    /// Returns `None` when the name is absent or its slot is corrupt.
    #[must_use]
    pub fn find_location(&self, name: &str) -> Option<Location<'_>> {
        let len = self.header.table_len();
        if len == 0 {
            return None;
        }
        let value = self.redirect(slot(hash_code(name, HASH_MULTIPLIER), len))?;
        let index = match value.cmp(&0) {
            Ordering::Less => usize::try_from(-1 - value).ok()?,
            Ordering::Greater => slot(hash_code(name, value), len),
            Ordering::Equal => return None,
        };
        let location = self.location_at(self.location_offset(index)?).ok()?;
        (location.full_name() == name).then_some(location)
    }

    /// Iterates over every location in table order.
    pub fn locations(&self) -> impl Iterator<Item = Result<Location<'_>>> + '_ {
        (0..self.header.table_len()).map(move |index| {
            let offset = self
                .location_offset(index)
                .ok_or_else(|| ImageFsError::format(format!("offset slot {index} truncated")))?;
            self.location_at(offset)
        })
    }

    /// Reads and, if needed, decompresses the content of a resource.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Format` if the content lies outside the image
    /// or cannot be decompressed.
    pub fn read_resource(&self, location: &Location<'_>) -> Result<Vec<u8>> {
        let stored_size = if location.is_compressed() {
            location.compressed_size
        } else {
            location.uncompressed_size
        };
        let start = usize::try_from(location.content_offset)
            .ok()
            .and_then(|offset| self.header.index_size().checked_add(offset));
        let end = start.and_then(|start| start.checked_add(usize::try_from(stored_size).ok()?));
        let stored = match (start, end) {
            (Some(start), Some(end)) => self.data.get(start..end),
            _ => None,
        }
        .ok_or_else(|| {
            ImageFsError::format(format!(
                "content of {} lies outside the image",
                location.full_name()
            ))
        })?;

        if location.is_compressed() {
            decompress::decompress(
                stored,
                self.header.order,
                self.strings(),
                location.uncompressed_size,
            )
        } else {
            Ok(stored.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ImageWriter;

    fn sample() -> ImageReader {
        let mut writer = ImageWriter::new();
        let _ = writer
            .add("/java.base/module-info.class", b"module-info".to_vec())
            .add("/java.base/java/lang/Object.class", b"object".to_vec())
            .add("/java.base/java/lang/String.class", b"string".to_vec())
            .add_compressed("/java.sql/java/sql/Driver.class", b"driver ".repeat(20));
        ImageReader::from_bytes(writer.to_bytes().expect("write")).expect("read")
    }

    #[test]
    fn find_location_resolves_every_written_name() {
        let reader = sample();
        for name in [
            "/java.base/module-info.class",
            "/java.base/java/lang/Object.class",
            "/java.base/java/lang/String.class",
            "/java.sql/java/sql/Driver.class",
        ] {
            let location = reader.find_location(name).expect(name);
            assert_eq!(location.full_name(), name);
        }
    }

    #[test]
    fn find_location_misses_unknown_names() {
        let reader = sample();
        assert!(reader.find_location("/java.base/java/lang/Missing.class").is_none());
        assert!(reader.find_location("").is_none());
    }

    #[test]
    fn read_resource_returns_plain_and_compressed_content() {
        let reader = sample();
        let object = reader.find_location("/java.base/java/lang/Object.class").unwrap();
        assert_eq!(reader.read_resource(&object).unwrap(), b"object");

        let driver = reader.find_location("/java.sql/java/sql/Driver.class").unwrap();
        assert!(driver.is_compressed());
        assert_eq!(reader.read_resource(&driver).unwrap(), b"driver ".repeat(20));
    }

    #[test]
    fn locations_visits_every_resource() {
        let reader = sample();
        let names: Vec<String> = reader
            .locations()
            .map(|l| l.expect("location").full_name())
            .collect();
        assert_eq!(names.len(), 4);
        assert!(names.contains(&"/java.sql/java/sql/Driver.class".to_string()));
    }

    #[test]
    fn empty_image_has_no_locations() {
        let reader = ImageReader::from_bytes(ImageWriter::new().to_bytes().unwrap()).unwrap();
        assert_eq!(reader.locations().count(), 0);
        assert!(reader.find_location("/java.base/module-info.class").is_none());
    }

    #[test]
    fn truncated_index_is_rejected() {
        let mut bytes = sample_bytes();
        bytes.truncate(40);
        assert!(ImageReader::from_bytes(bytes).is_err());
    }

    fn sample_bytes() -> Vec<u8> {
        let mut writer = ImageWriter::new();
        let _ = writer.add("/java.base/module-info.class", b"module-info".to_vec());
        writer.to_bytes().unwrap()
    }
}
