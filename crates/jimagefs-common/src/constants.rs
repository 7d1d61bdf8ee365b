//! Format constants, reserved tokens and default values.

/// Token separating the image location from the in-image path in an
/// overlay path (`<location>!!/<relative-path>`).
pub const SEPARATOR: &str = "!!/";

/// Protocol name reported by the overlay filesystem.
pub const PROTOCOL: &str = "jrt";

/// Marker file whose presence identifies a modular runtime installation,
/// relative to the installation root.
pub const MARKER_FILE: &str = "lib/jrt-fs.jar";

/// Image file holding the modules, relative to the installation root.
pub const MODULES_FILE: &str = "lib/modules";

/// Magic number opening every modules image.
pub const IMAGE_MAGIC: u32 = 0xCAFE_DADA;

/// Major image format version understood by the reader.
pub const IMAGE_MAJOR_VERSION: u16 = 1;

/// Minor image format version written by the image writer.
pub const IMAGE_MINOR_VERSION: u16 = 0;

/// Magic number opening a compressed resource header.
pub const COMPRESSED_MAGIC: u32 = 0xCAFE_FAFA;

/// Multiplier (and default seed) of the image string hash.
pub const HASH_MULTIPLIER: i32 = 0x0100_0193;

/// Name of the zlib-based resource decompressor.
pub const ZIP_DECOMPRESSOR: &str = "zip";

/// Synthetic top-level module holding directory tree entries.
pub const MODULES_TREE: &str = "modules";

/// Synthetic top-level module holding package-to-module entries.
pub const PACKAGES_TREE: &str = "packages";

/// First host runtime version that ships a built-in image reader.
pub const BUILTIN_READER_SINCE: u32 = 9;

/// Host runtime version assumed when none is configured.
pub const DEFAULT_HOST_RUNTIME_VERSION: u32 = 17;

/// Environment variable overriding the host runtime version.
pub const HOST_VERSION_ENV: &str = "JIMAGEFS_HOST_VERSION";

/// Build identifier reported to the host when none is available.
pub const FALLBACK_BUILD_NUMBER: &str = "999.SNAPSHOT";

/// Application name used in CLI output.
pub const APP_NAME: &str = "jimagefs";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "jimg";
