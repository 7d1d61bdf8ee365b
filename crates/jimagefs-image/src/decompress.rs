//! Compressed resource decoding.
//!
//! A compressed resource starts with a 29-byte header naming the
//! decompressor. Compression may be stacked: the output of one decompressor
//! can itself start with another header, so decoding repeats until the
//! content no longer carries the compressed-resource magic.

use std::io::Read;

use flate2::read::ZlibDecoder;
use jimagefs_common::constants::{COMPRESSED_MAGIC, ZIP_DECOMPRESSOR};
use jimagefs_common::error::{ImageFsError, Result};

use crate::header::ByteOrder;
use crate::strings::StringTable;

/// Size of a compressed resource header in bytes.
pub const COMPRESSED_HEADER_SIZE: usize = 4 + 8 + 8 + 4 + 4 + 1;

/// Header preceding one layer of compressed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedHeader {
    /// Size of the compressed payload following the header.
    pub compressed_size: u64,
    /// Size of the payload once decompressed.
    pub uncompressed_size: u64,
    /// String offset of the decompressor name.
    pub decompressor_name_offset: u32,
    /// String offset of the decompressor configuration.
    pub decompressor_config_offset: u32,
    /// Whether this is the innermost layer.
    pub is_terminal: bool,
}

impl CompressedHeader {
    /// Parses a header at the start of `data`, if one is present.
    #[must_use]
    pub fn parse(data: &[u8], order: ByteOrder) -> Option<Self> {
        if data.len() < COMPRESSED_HEADER_SIZE || order.read_u32(data, 0)? != COMPRESSED_MAGIC {
            return None;
        }
        Some(Self {
            compressed_size: order.read_u64(data, 4)?,
            uncompressed_size: order.read_u64(data, 12)?,
            decompressor_name_offset: order.read_u32(data, 20)?,
            decompressor_config_offset: order.read_u32(data, 24)?,
            is_terminal: data[28] != 0,
        })
    }
}

/// Decodes stored resource bytes into their original content.
///
/// # Errors
///
/// Returns `ImageFsError::Format` if a header is inconsistent, names an
/// unsupported decompressor, or the final size differs from `expected_size`.
pub fn decompress(
    stored: &[u8],
    order: ByteOrder,
    strings: StringTable<'_>,
    expected_size: u64,
) -> Result<Vec<u8>> {
    let mut content = stored.to_vec();
    while let Some(header) = CompressedHeader::parse(&content, order) {
        let name = strings.get(u64::from(header.decompressor_name_offset))?;
        let payload_len = usize::try_from(header.compressed_size)
            .map_err(|_| ImageFsError::format("compressed size overflows"))?;
        let payload = COMPRESSED_HEADER_SIZE
            .checked_add(payload_len)
            .and_then(|end| content.get(COMPRESSED_HEADER_SIZE..end))
            .ok_or_else(|| ImageFsError::format("compressed payload truncated"))?;
        tracing::trace!(decompressor = name, size = payload_len, "decompressing resource layer");
        content = match name {
            ZIP_DECOMPRESSOR => inflate(payload, header.uncompressed_size)?,
            other => {
                return Err(ImageFsError::format(format!(
                    "unsupported decompressor `{other}`"
                )));
            }
        };
    }
    if content.len() as u64 != expected_size {
        return Err(ImageFsError::format(format!(
            "decompressed size {} does not match expected {expected_size}",
            content.len()
        )));
    }
    Ok(content)
}

/// Inflates one zip layer. The declared size only bounds the read; the buffer
/// grows with the actual output.
fn inflate(payload: &[u8], uncompressed_size: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let _ = ZlibDecoder::new(payload)
        .take(uncompressed_size.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| ImageFsError::format(format!("zip layer is corrupt: {e}")))?;
    if out.len() as u64 != uncompressed_size {
        return Err(ImageFsError::format(format!(
            "zip layer produced {} bytes, header declares {uncompressed_size}",
            out.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    use super::*;

    const STRINGS: &[u8] = b"\0zip\0compact-cp\0";

    fn layer(name_offset: u32, payload: &[u8], uncompressed: u64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&COMPRESSED_MAGIC.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&uncompressed.to_le_bytes());
        out.extend_from_slice(&name_offset.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.push(1);
        out.extend_from_slice(payload);
        out
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).expect("compress");
        encoder.finish().expect("finish")
    }

    #[test]
    fn plain_content_passes_through() {
        let out = decompress(b"hello", ByteOrder::Little, StringTable::new(STRINGS), 5)
            .expect("decompress");
        assert_eq!(out, b"hello");
    }

    #[test]
    fn zip_layer_is_inflated() {
        let original = b"class file bytes class file bytes class file bytes";
        let stored = layer(1, &zlib(original), original.len() as u64);
        let out = decompress(
            &stored,
            ByteOrder::Little,
            StringTable::new(STRINGS),
            original.len() as u64,
        )
        .expect("decompress");
        assert_eq!(out, original);
    }

    #[test]
    fn stacked_zip_layers_are_inflated() {
        let original = b"stacked stacked stacked";
        let inner = layer(1, &zlib(original), original.len() as u64);
        let outer = layer(1, &zlib(&inner), inner.len() as u64);
        let out = decompress(
            &outer,
            ByteOrder::Little,
            StringTable::new(STRINGS),
            original.len() as u64,
        )
        .expect("decompress");
        assert_eq!(out, original);
    }

    #[test]
    fn unknown_decompressor_is_rejected() {
        let stored = layer(5, b"opaque", 6);
        let err = decompress(&stored, ByteOrder::Little, StringTable::new(STRINGS), 6)
            .unwrap_err();
        assert!(matches!(err, ImageFsError::Format { .. }));
        assert!(err.to_string().contains("compact-cp"));
    }

    #[test]
    fn size_mismatch_is_rejected() {
        assert!(decompress(b"abc", ByteOrder::Little, StringTable::new(STRINGS), 4).is_err());
    }

    fn is_format(result: &Result<Vec<u8>>) -> bool {
        matches!(result, Err(ImageFsError::Format { .. }))
    }

    fn with_compressed_size(mut stored: Vec<u8>, compressed_size: u64) -> Vec<u8> {
        stored[4..12].copy_from_slice(&compressed_size.to_le_bytes());
        stored
    }

    #[test]
    fn overflowing_compressed_size_is_rejected() {
        let stored = with_compressed_size(layer(1, &zlib(b"data"), 4), u64::MAX);
        let result = decompress(&stored, ByteOrder::Little, StringTable::new(STRINGS), 4);
        assert!(is_format(&result));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let payload = zlib(b"truncated payload");
        let stored = with_compressed_size(layer(1, &payload, 17), payload.len() as u64 + 10);
        let result = decompress(&stored, ByteOrder::Little, StringTable::new(STRINGS), 17);
        assert!(is_format(&result));
        assert!(result.unwrap_err().to_string().contains("truncated"));
    }

    #[test]
    fn corrupt_zip_stream_is_rejected() {
        let stored = layer(1, b"not a zlib stream", 32);
        let result = decompress(&stored, ByteOrder::Little, StringTable::new(STRINGS), 32);
        assert!(is_format(&result));
    }

    #[test]
    fn huge_declared_size_does_not_preallocate() {
        let stored = layer(1, &zlib(b"tiny"), u64::MAX / 2);
        let result = decompress(&stored, ByteOrder::Little, StringTable::new(STRINGS), 4);
        assert!(is_format(&result));
        assert!(result.unwrap_err().to_string().contains("produced 4 bytes"));
    }

    #[test]
    fn output_longer_than_declared_is_rejected() {
        let original = b"longer than declared";
        let stored = layer(1, &zlib(original), 6);
        let result = decompress(&stored, ByteOrder::Little, StringTable::new(STRINGS), 6);
        assert!(is_format(&result));
        assert!(result.unwrap_err().to_string().contains("produced 7 bytes"));
    }

    #[test]
    fn layer_size_disagreeing_with_expected_size_is_rejected() {
        let original = b"consistent layer";
        let stored = layer(1, &zlib(original), original.len() as u64);
        let result = decompress(&stored, ByteOrder::Little, StringTable::new(STRINGS), 99);
        assert!(is_format(&result));
    }
}
