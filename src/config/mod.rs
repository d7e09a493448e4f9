//! Project configuration (`espresso.toml`)
//!
//! ```toml
//! name = "hello"
//! base_package = "org.example.hello"
//!
//! [version]
//! major = 0
//! minor = 1
//! patch = 0
//!
//! [toolchain]
//! path = "${JAVA_HOME}"
//!
//! [[registries]]
//! name = "espresso-registry"
//! url = "https://github.com/Kerosene-Labs/espresso-registry/archive/refs/heads/main.zip"
//!
//! [[dependencies]]
//! group = "com.google.code.gson"
//! name = "gson"
//! version = "2.11.0"
//! ```
//!
//! Registry order is priority order, highest first.

mod defaults;

use std::fmt;
use std::fs;
use std::path::Path;

use espresso_registry::{Dependency, Registry};
use serde::{Deserialize, Serialize};

use crate::error::{EspressoError, EspressoResult};

pub(crate) use defaults::main_class_source;
pub use defaults::{DEFAULT_REGISTRY_NAME, DEFAULT_REGISTRY_URL, DEFAULT_TOOLCHAIN_PATH};

/// Project config file name
pub const CONFIG_FILE: &str = "espresso.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub base_package: String,
    pub version: Version,
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub registries: Vec<Registry>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub build: BuildConfig,
}

/// Semantic project version with an optional hotfix suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotfix: Option<String>,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(hotfix) = &self.hotfix {
            write!(f, "-{}", hotfix)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// JDK location; `${JAVA_HOME}` is expanded at use
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Worker pool size for parallel stages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl ProjectConfig {
    /// A fresh project with the default registry and toolchain.
    pub fn new(name: impl Into<String>, base_package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_package: base_package.into(),
            version: Version {
                major: 0,
                minor: 1,
                patch: 0,
                hotfix: None,
            },
            toolchain: ToolchainConfig {
                path: DEFAULT_TOOLCHAIN_PATH.to_string(),
            },
            registries: vec![Registry::new(DEFAULT_REGISTRY_NAME, DEFAULT_REGISTRY_URL)],
            dependencies: Vec::new(),
            build: BuildConfig::default(),
        }
    }

    pub fn load(path: &Path) -> EspressoResult<Self> {
        let content = fs::read_to_string(path).map_err(EspressoError::io(path))?;
        let config: Self = toml::from_str(&content).map_err(|source| EspressoError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn persist(&self, path: &Path) -> EspressoResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(EspressoError::io(parent))?;
        }
        fs::write(path, content).map_err(EspressoError::io(path))
    }

    /// Reject configs the build cannot act on.
    pub fn validate(&self) -> EspressoResult<()> {
        if self.base_package.trim().is_empty() {
            return Err(EspressoError::Configuration("base_package must not be empty".into()));
        }
        if self.dependencies.iter().any(|d| d.group.is_empty() || d.name.is_empty() || d.version.is_empty()) {
            return Err(EspressoError::Configuration(
                "every dependency needs a group, name and version".into(),
            ));
        }
        if let Some(registry) = self.registries.iter().find(|r| !r.has_valid_name()) {
            return Err(EspressoError::Configuration(format!(
                "registry name '{}' must be a single path segment",
                registry.name
            )));
        }
        if let Some(dep) = self.dependencies.iter().find(|d| !d.has_valid_name()) {
            return Err(EspressoError::Configuration(format!(
                "dependency name '{}' must be a single path segment without whitespace",
                dep.name
            )));
        }
        if self.build.jobs == Some(0) {
            return Err(EspressoError::Configuration("build.jobs must be at least 1".into()));
        }
        Ok(())
    }
}
