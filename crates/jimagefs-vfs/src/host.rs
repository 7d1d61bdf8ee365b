//! Host environment and image opening strategy.
//!
//! The host environment is installed once per process. It carries the
//! compatibility properties every embedding needs and the host runtime
//! version, from which the [`OpenStrategy`] is derived.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use jimagefs_common::config::HostConfig;
use jimagefs_common::constants::{
    BUILTIN_READER_SINCE, DEFAULT_HOST_RUNTIME_VERSION, FALLBACK_BUILD_NUMBER,
};
use jimagefs_common::error::Result;

/// Property declaring a UI-less host.
pub const HEADLESS_PROPERTY: &str = "java.awt.headless";

/// Compatibility properties applied over caller-supplied ones.
pub const FIXED_PROPERTIES: [(&str, &str); 8] = [
    ("idea.io.use.nio2", "true"),
    ("project.structure.add.tools.jar.to.new.jdk", "false"),
    ("psi.track.invalidation", "true"),
    ("psi.incremental.reparse.depth.limit", "1000"),
    ("ide.hide.excluded.files", "false"),
    ("ast.loading.filter", "false"),
    ("idea.ignore.disabled.plugins", "true"),
    ("idea.plugins.compatible.build", FALLBACK_BUILD_NUMBER),
];

static INSTALLED: OnceLock<HostEnvironment> = OnceLock::new();

/// How backing images are opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStrategy {
    /// The host ships a built-in image reader; open the image directly with
    /// the installation as its `home`. No loader is created.
    HostProvided,
    /// The host has no built-in reader; a dedicated loader rooted at the
    /// installation's marker file opens the image and is kept for the
    /// process lifetime.
    BootstrapLoader,
}

impl OpenStrategy {
    /// Selects the strategy for a host runtime version.
    #[must_use]
    pub const fn for_version(runtime_version: u32) -> Self {
        if runtime_version >= BUILTIN_READER_SINCE {
            Self::HostProvided
        } else {
            Self::BootstrapLoader
        }
    }

    /// Strategy of the installed host environment.
    #[must_use]
    pub fn detect() -> Self {
        Self::for_version(HostEnvironment::current().runtime_version())
    }
}

/// Process-wide host settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    headless: bool,
    runtime_version: u32,
    properties: BTreeMap<String, String>,
}

impl HostEnvironment {
    /// Builds an environment from configuration, applying the fixed
    /// compatibility properties.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Config` if the host runtime version cannot be
    /// resolved.
    pub fn from_config(config: &HostConfig) -> Result<Self> {
        let mut properties = config.properties.clone();
        let _ = properties
            .entry(HEADLESS_PROPERTY.to_string())
            .or_insert_with(|| "true".to_string());
        for (key, value) in FIXED_PROPERTIES {
            let _ = properties.insert(key.to_string(), value.to_string());
        }
        Ok(Self {
            headless: config.headless,
            runtime_version: config.resolve_runtime_version()?,
            properties,
        })
    }

    /// Installs `env` as the process environment.
    ///
    /// Only the first installation takes effect; the installed environment
    /// is returned either way. A non-headless environment is reported as an
    /// error in the log but still installed.
    pub fn install(env: Self) -> &'static Self {
        install_into(&INSTALLED, env)
    }

    /// The installed environment, installing the default one if none was.
    pub fn current() -> &'static Self {
        INSTALLED.get_or_init(|| {
            Self::from_config(&HostConfig::default()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default host runtime version");
                Self::from_config(&HostConfig {
                    runtime_version: Some(DEFAULT_HOST_RUNTIME_VERSION),
                    ..HostConfig::default()
                })
                .unwrap_or_else(|_| Self {
                    headless: true,
                    runtime_version: DEFAULT_HOST_RUNTIME_VERSION,
                    properties: BTreeMap::new(),
                })
            })
        })
    }

    /// Whether the host runs without UI.
    #[must_use]
    pub const fn is_headless(&self) -> bool {
        self.headless
    }

    /// Feature version of the host runtime.
    #[must_use]
    pub const fn runtime_version(&self) -> u32 {
        self.runtime_version
    }

    /// Value of a compatibility property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// All compatibility properties.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

fn install_into(slot: &OnceLock<HostEnvironment>, env: HostEnvironment) -> &HostEnvironment {
    slot.get_or_init(|| {
        if !env.headless {
            tracing::error!("host environment should only be installed in headless mode");
        }
        tracing::debug!(
            runtime_version = env.runtime_version,
            properties = env.properties.len(),
            "installing host environment"
        );
        env
    })
}
