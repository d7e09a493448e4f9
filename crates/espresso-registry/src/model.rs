//! Registry, package and dependency records

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// A named, URL-addressed source of package metadata.
///
/// Position in the project's registry list is its priority, highest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Registry name, also its cache directory name
    pub name: String,
    /// URL of the registry's zip archive
    pub url: String,
}

impl Registry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Whether `name` can be used as this registry's cache directory
    pub fn has_valid_name(&self) -> bool {
        is_path_segment(&self.name)
    }
}

/// A requested dependency coordinate: `group:name:version`.
///
/// `version` is matched by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl Dependency {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Dependency {
    /// Whether `name` can become `libs/<name>.jar` in the distribution tree
    /// and a single `Class-Path` token.
    pub fn has_valid_name(&self) -> bool {
        is_path_segment(&self.name) && !self.name.chars().any(char::is_whitespace)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}

/// True when `name` is exactly one normal path component: not empty, no
/// separators, not `.` or `..`, not absolute.
pub fn is_path_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment == name
    ) && !name.contains(['/', '\\'])
}

/// One published version in a package declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersion {
    /// Version string, never parsed as semver
    pub number: String,
    /// Where the binary artifact is downloaded from
    pub artifact_url: String,
    #[serde(default)]
    pub transient_dependencies: Vec<String>,
    #[serde(default)]
    pub is_annotation_processor: bool,
}

/// The on-disk unit parsed from one declaration file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageDeclaration {
    /// Package name; falls back to the declaration file stem when omitted
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub versions: Vec<PackageVersion>,
}

/// A declaration enriched with its group and the registry it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub group: String,
    pub name: String,
    pub description: String,
    pub versions: Vec<PackageVersion>,
    pub registry: Registry,
}

impl Package {
    pub fn from_declaration(group: String, declaration: PackageDeclaration, registry: Registry) -> Self {
        Self {
            group,
            name: declaration.name,
            description: declaration.description,
            versions: declaration.versions,
            registry,
        }
    }

    /// The last declared version, treated as the latest.
    pub fn latest_version(&self) -> Option<&PackageVersion> {
        self.versions.last()
    }

    /// Find a version by exact string equality.
    pub fn version(&self, number: &str) -> Option<&PackageVersion> {
        self.versions.iter().find(|v| v.number == number)
    }
}
