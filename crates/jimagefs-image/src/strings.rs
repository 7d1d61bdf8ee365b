//! String table access and the resource-name hash.

use jimagefs_common::constants::HASH_MULTIPLIER;
use jimagefs_common::error::{ImageFsError, Result};

/// Hashes a resource name with the given seed.
///
/// The result is always non-negative. Seeds other than
/// [`HASH_MULTIPLIER`] come from the redirect table.
#[must_use]
pub fn hash_code(name: &str, seed: i32) -> i32 {
    let hash = name
        .bytes()
        .fold(seed, |h, b| h.wrapping_mul(HASH_MULTIPLIER) ^ i32::from(b));
    hash & 0x7FFF_FFFF
}

/// Maps a non-negative hash onto a table of `len` slots.
#[must_use]
pub fn slot(hash: i32, len: usize) -> usize {
    usize::try_from(hash).unwrap_or_default() % len
}

/// Borrowed view over the NUL-terminated string table.
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    data: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Wraps the raw string table bytes.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Returns the string starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Format` if the offset is out of range, the
    /// string is not terminated, or it is not valid UTF-8.
    pub fn get(&self, offset: u64) -> Result<&'a str> {
        let start = usize::try_from(offset)
            .ok()
            .filter(|start| *start < self.data.len())
            .ok_or_else(|| ImageFsError::format(format!("string offset {offset} out of range")))?;
        let rest = &self.data[start..];
        let end = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| ImageFsError::format(format!("unterminated string at {offset}")))?;
        std::str::from_utf8(&rest[..end])
            .map_err(|e| ImageFsError::format(format!("invalid string at {offset}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_of_empty_name_is_the_seed() {
        assert_eq!(hash_code("", HASH_MULTIPLIER), HASH_MULTIPLIER);
    }

    #[test]
    fn hash_is_non_negative_and_seed_dependent() {
        let name = "/java.base/java/lang/Object.class";
        let a = hash_code(name, HASH_MULTIPLIER);
        let b = hash_code(name, 7);
        assert!(a >= 0);
        assert!(b >= 0);
        assert_ne!(a, b);
    }

    #[test]
    fn string_table_reads_terminated_strings() {
        let table = StringTable::new(b"\0java.base\0class\0");
        assert_eq!(table.get(0).unwrap(), "");
        assert_eq!(table.get(1).unwrap(), "java.base");
        assert_eq!(table.get(11).unwrap(), "class");
    }

    #[test]
    fn string_table_rejects_bad_offsets() {
        let table = StringTable::new(b"abc");
        assert!(table.get(0).is_err());
        assert!(table.get(10).is_err());
    }
}
