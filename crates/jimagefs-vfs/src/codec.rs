//! Overlay path codec.
//!
//! An overlay path is `<image-location>!!/<relative-path>`. The location is
//! everything before the first separator; the relative path, possibly
//! empty, is everything after it. Neither part is normalized.

use jimagefs_common::constants::SEPARATOR;
use jimagefs_common::error::{ImageFsError, Result};
use jimagefs_common::types::ImageLocation;

/// Splits an overlay path at the first separator.
///
/// # Errors
///
/// Returns `ImageFsError::InvalidPathFormat` if the path contains no
/// separator.
pub fn decode(path: &str) -> Result<(ImageLocation, &str)> {
    let (location, relative) =
        path.split_once(SEPARATOR)
            .ok_or_else(|| ImageFsError::InvalidPathFormat {
                path: path.to_string(),
                separator: SEPARATOR,
            })?;
    Ok((ImageLocation::new(location), relative))
}

/// Joins a location and a relative path into an overlay path.
#[must_use]
pub fn encode(location: &ImageLocation, relative: &str) -> String {
    format!("{}{SEPARATOR}{relative}", location.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_splits_at_first_separator() {
        let (location, relative) = decode("/opt/jdk17!!/java.base/module-info.class").unwrap();
        assert_eq!(location.as_str(), "/opt/jdk17");
        assert_eq!(relative, "java.base/module-info.class");
    }

    #[test]
    fn decode_allows_empty_relative_path() {
        let (location, relative) = decode("/opt/jdk17!!/").unwrap();
        assert_eq!(location.as_str(), "/opt/jdk17");
        assert_eq!(relative, "");
    }

    #[test]
    fn decode_keeps_later_separators_in_relative_path() {
        let (location, relative) = decode("/a!!/b!!/c").unwrap();
        assert_eq!(location.as_str(), "/a");
        assert_eq!(relative, "b!!/c");
    }

    #[test]
    fn decode_does_not_normalize() {
        let (location, relative) = decode("/opt/jdk17/!!//java.base//x").unwrap();
        assert_eq!(location.as_str(), "/opt/jdk17/");
        assert_eq!(relative, "/java.base//x");
    }

    #[test]
    fn decode_without_separator_is_invalid() {
        let err = decode("no-separator-here").unwrap_err();
        assert!(matches!(err, ImageFsError::InvalidPathFormat { .. }));
        assert!(decode("/opt/jdk17!!").is_err());
    }

    #[test]
    fn encode_inverts_decode() {
        for (location, relative) in [
            ("/opt/jdk17", "java.base/module-info.class"),
            ("/opt/jdk17", ""),
            ("", "java.base"),
            ("C:/jdk", "java.sql/java/sql/Driver.class"),
            ("/a", "b!!/c"),
        ] {
            let location = ImageLocation::new(location);
            let encoded = encode(&location, relative);
            let (decoded_location, decoded_relative) = decode(&encoded).unwrap();
            assert_eq!(decoded_location, location);
            assert_eq!(decoded_relative, relative);
        }
    }
}
