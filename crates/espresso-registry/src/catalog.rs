//! Package catalog built from a registry cache
//!
//! A catalog is recomputed from disk whenever it is loaded. Packages appear
//! sorted by group directory, then declaration file name; versions keep the
//! order they were declared in.

use crate::cache::RegistryCache;
use crate::declaration::parse_declaration;
use crate::error::RegistryResult;
use crate::model::{Package, Registry};

/// Wildcard search term matching every package
pub const MATCH_ALL: &str = "*";

#[derive(Debug, Clone)]
pub struct Catalog {
    registry: Registry,
    packages: Vec<Package>,
}

impl Catalog {
    /// Walk the registry's cached metadata and parse every declaration.
    ///
    /// Fails if the registry is not cached or its metadata directory is missing.
    pub fn load(cache: &RegistryCache, registry: &Registry) -> RegistryResult<Self> {
        let mut packages = Vec::new();

        for group_path in cache.list_package_groups(registry)? {
            let group = group_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            for declaration_path in RegistryCache::list_declaration_files(&group_path)? {
                let declaration = parse_declaration(&declaration_path)?;
                packages.push(Package::from_declaration(group.clone(), declaration, registry.clone()));
            }
        }

        tracing::debug!(registry = %registry.name, packages = packages.len(), "catalog loaded");
        Ok(Self {
            registry: registry.clone(),
            packages,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn into_packages(self) -> Vec<Package> {
        self.packages
    }

    /// First package with exactly this group and name
    pub fn find(&self, group: &str, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.group == group && p.name == name)
    }

    /// Packages whose name or description contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> Vec<&Package> {
        if term == MATCH_ALL {
            return self.packages.iter().collect();
        }

        let needle = term.to_lowercase();
        self.packages
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle) || p.description.to_lowercase().contains(&needle))
            .collect()
    }
}
