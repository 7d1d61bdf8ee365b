//! Configuration model for embedding the overlay filesystem.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HOST_RUNTIME_VERSION, HOST_VERSION_ENV};
use crate::error::{ImageFsError, Result};

/// Root configuration for jimagefs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JimageFsConfig {
    /// Settings describing the host execution environment.
    pub host: HostConfig,
}

impl JimageFsConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ImageFsError::read(path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }
}

/// Host execution environment settings consumed once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Whether the host runs without any UI.
    pub headless: bool,
    /// Feature version of the host runtime. Falls back to the
    /// `JIMAGEFS_HOST_VERSION` environment variable, then to the default.
    pub runtime_version: Option<u32>,
    /// Extra compatibility properties supplied by the embedder.
    pub properties: BTreeMap<String, String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            headless: true,
            runtime_version: None,
            properties: BTreeMap::new(),
        }
    }
}

impl HostConfig {
    /// Resolves the host runtime version.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Config` if the environment override is not a
    /// positive integer.
    pub fn resolve_runtime_version(&self) -> Result<u32> {
        if let Some(version) = self.runtime_version {
            return Ok(version);
        }
        match std::env::var(HOST_VERSION_ENV) {
            Ok(raw) => parse_version(&raw),
            Err(_) => Ok(DEFAULT_HOST_RUNTIME_VERSION),
        }
    }
}

/// Parses a runtime version such as `17`, `1.8` or `21.0.2`.
///
/// Legacy `1.x` versions map to `x`.
fn parse_version(raw: &str) -> Result<u32> {
    let invalid = || ImageFsError::Config {
        message: format!("invalid host runtime version: {raw:?}"),
    };
    let mut parts = raw.trim().split('.');
    let first: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let version = if first == 1 {
        parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?
    } else {
        first
    };
    if version == 0 {
        return Err(invalid());
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_host_is_headless_without_version() {
        let host = HostConfig::default();
        assert!(host.headless);
        assert!(host.runtime_version.is_none());
    }

    #[test]
    fn explicit_runtime_version_wins() {
        let host = HostConfig {
            runtime_version: Some(8),
            ..HostConfig::default()
        };
        assert_eq!(host.resolve_runtime_version().unwrap(), 8);
    }

    #[test]
    fn parse_version_handles_legacy_and_modern_forms() {
        assert_eq!(parse_version("1.8").unwrap(), 8);
        assert_eq!(parse_version("17").unwrap(), 17);
        assert_eq!(parse_version("21.0.2").unwrap(), 21);
        assert!(parse_version("abc").is_err());
        assert!(parse_version("0").is_err());
    }

    #[test]
    fn config_loads_partial_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jimagefs.json");
        std::fs::write(&path, r#"{"host":{"runtime_version":8}}"#).expect("write");

        let config = JimageFsConfig::from_json_file(&path).expect("load");
        assert_eq!(config.host.runtime_version, Some(8));
        assert!(config.host.headless);
        assert!(config.host.properties.is_empty());
    }

    #[test]
    fn config_missing_file_is_read_error() {
        let err = JimageFsConfig::from_json_file(Path::new("/nonexistent/jimagefs.json"))
            .unwrap_err();
        assert!(matches!(err, ImageFsError::Read { .. }));
    }
}
