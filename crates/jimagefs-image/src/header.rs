//! Image header and index geometry.
//!
//! The header is written in the byte order of the machine that produced the
//! image. The order is detected from the magic number, everything after it is
//! read in that order.

use jimagefs_common::constants::{IMAGE_MAGIC, IMAGE_MAJOR_VERSION};
use jimagefs_common::error::{ImageFsError, Result};

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 7 * 4;

/// Byte order of the integers stored in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    /// Returns the byte order of the running machine.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    fn take<const N: usize>(data: &[u8], pos: usize) -> Option<[u8; N]> {
        data.get(pos..pos.checked_add(N)?)?.try_into().ok()
    }

    /// Reads an unsigned 32-bit integer at `pos`.
    #[must_use]
    pub fn read_u32(self, data: &[u8], pos: usize) -> Option<u32> {
        let bytes = Self::take::<4>(data, pos)?;
        Some(match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        })
    }

    /// Reads a signed 32-bit integer at `pos`.
    #[must_use]
    pub fn read_i32(self, data: &[u8], pos: usize) -> Option<i32> {
        let bytes = Self::take::<4>(data, pos)?;
        Some(match self {
            Self::Little => i32::from_le_bytes(bytes),
            Self::Big => i32::from_be_bytes(bytes),
        })
    }

    /// Reads an unsigned 64-bit integer at `pos`.
    #[must_use]
    pub fn read_u64(self, data: &[u8], pos: usize) -> Option<u64> {
        let bytes = Self::take::<8>(data, pos)?;
        Some(match self {
            Self::Little => u64::from_le_bytes(bytes),
            Self::Big => u64::from_be_bytes(bytes),
        })
    }
}

/// Parsed image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Byte order detected from the magic number.
    pub order: ByteOrder,
    /// Major format version.
    pub major_version: u16,
    /// Minor format version.
    pub minor_version: u16,
    /// Format flags (currently unused).
    pub flags: u32,
    /// Number of resources stored in the image.
    pub resource_count: u32,
    /// Number of slots in the redirect and offsets tables.
    pub table_length: u32,
    /// Size of the location attribute stream in bytes.
    pub locations_size: u32,
    /// Size of the string table in bytes.
    pub strings_size: u32,
}

impl ImageHeader {
    /// Parses the header at the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Format` if the data is truncated, the magic
    /// number is wrong, or the major version is not supported.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ImageFsError::format(format!(
                "header truncated: {} bytes",
                data.len()
            )));
        }
        let order = if ByteOrder::Little.read_u32(data, 0) == Some(IMAGE_MAGIC) {
            ByteOrder::Little
        } else if ByteOrder::Big.read_u32(data, 0) == Some(IMAGE_MAGIC) {
            ByteOrder::Big
        } else {
            return Err(ImageFsError::format("bad magic number"));
        };

        let field = |index: usize| order.read_u32(data, index * 4).unwrap_or_default();
        let version = field(1);
        let major_version = u16::try_from(version >> 16).unwrap_or(u16::MAX);
        let minor_version = u16::try_from(version & 0xFFFF).unwrap_or(u16::MAX);
        if major_version != IMAGE_MAJOR_VERSION {
            return Err(ImageFsError::format(format!(
                "unsupported image version {major_version}.{minor_version}"
            )));
        }

        Ok(Self {
            order,
            major_version,
            minor_version,
            flags: field(2),
            resource_count: field(3),
            table_length: field(4),
            locations_size: field(5),
            strings_size: field(6),
        })
    }

    /// Number of table slots as a `usize`.
    #[must_use]
    pub fn table_len(&self) -> usize {
        self.table_length as usize
    }

    /// Offset of the redirect table.
    #[must_use]
    pub const fn redirect_offset(&self) -> usize {
        HEADER_SIZE
    }

    /// Offset of the location offsets table.
    #[must_use]
    pub fn offsets_offset(&self) -> usize {
        self.redirect_offset() + self.table_len() * 4
    }

    /// Offset of the location attribute stream.
    #[must_use]
    pub fn locations_offset(&self) -> usize {
        self.offsets_offset() + self.table_len() * 4
    }

    /// Offset of the string table.
    #[must_use]
    pub fn strings_offset(&self) -> usize {
        self.locations_offset() + self.locations_size as usize
    }

    /// Total size of header and index. Resource content starts here.
    #[must_use]
    pub fn index_size(&self) -> usize {
        self.strings_offset() + self.strings_size as usize
    }
}
