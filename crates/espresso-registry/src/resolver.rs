//! Ordered multi-registry dependency resolution
//!
//! Registries are searched strictly in the order given. Within one registry
//! the first sorted catalog entry whose group, name and version string all
//! match exactly wins.

use serde::Serialize;

use crate::cache::RegistryCache;
use crate::catalog::Catalog;
use crate::error::{RegistryError, ResolveError, ResolveResult};
use crate::model::{Dependency, Package, PackageVersion, Registry};
use crate::signature::Signature;

/// A requested dependency matched to a concrete package version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDependency {
    pub requested: Dependency,
    pub package: Package,
    pub version: PackageVersion,
    pub signature: Signature,
}

impl ResolvedDependency {
    /// Registry that supplied the match
    pub fn registry(&self) -> &Registry {
        &self.package.registry
    }

    pub fn artifact_url(&self) -> &str {
        &self.version.artifact_url
    }
}

pub struct Resolver<'a> {
    cache: &'a RegistryCache,
}

impl<'a> Resolver<'a> {
    pub fn new(cache: &'a RegistryCache) -> Self {
        Self { cache }
    }

    pub fn resolve(&self, requested: &Dependency, registries: &[Registry]) -> ResolveResult<ResolvedDependency> {
        if !requested.has_valid_name() {
            return Err(RegistryError::InvalidName {
                kind: "dependency",
                name: requested.name.clone(),
            }
            .into());
        }

        for registry in registries {
            let catalog = Catalog::load(self.cache, registry)?;

            let found = catalog
                .packages()
                .iter()
                .filter(|p| p.group == requested.group && p.name == requested.name)
                .find_map(|p| p.version(&requested.version).map(|v| (p, v)));

            if let Some((package, version)) = found {
                tracing::debug!(
                    dependency = %requested,
                    registry = %registry.name,
                    "dependency resolved"
                );
                return Ok(ResolvedDependency {
                    requested: requested.clone(),
                    package: package.clone(),
                    version: version.clone(),
                    signature: Signature::compute(&requested.group, &requested.name, &requested.version),
                });
            }
        }

        Err(ResolveError::Unresolved {
            coordinate: requested.to_string(),
            searched: registries.iter().map(|r| r.name.clone()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{zip_bytes, MapFetcher};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn declaration(url: &str) -> String {
        format!("versions:\n  - number: 1.0.0\n    artifactUrl: {}\n", url)
    }

    /// R1 and R2 both declare org.example:lib:1.0.0, R2 also has org.example:only-two.
    fn setup(temp_dir: &TempDir) -> (RegistryCache, Registry, Registry) {
        let r1 = Registry::new("r1", "https://r1.example/archive.zip");
        let r2 = Registry::new("r2", "https://r2.example/archive.zip");
        let decl_a1 = declaration("https://a1.example/lib.jar");
        let decl_a2 = declaration("https://a2.example/lib.jar");
        let decl_two = declaration("https://a2.example/only-two.jar");

        let fetcher = MapFetcher::default()
            .with(&r1.url, zip_bytes(&[("packages/org.example/lib.yml", Some(decl_a1.as_str()))]))
            .with(
                &r2.url,
                zip_bytes(&[
                    ("packages/org.example/lib.yml", Some(decl_a2.as_str())),
                    ("packages/org.example/only-two.yml", Some(decl_two.as_str())),
                ]),
            );

        let cache = RegistryCache::new(temp_dir.path().join("registries"), Arc::new(fetcher));
        cache.populate(&r1).unwrap();
        cache.populate(&r2).unwrap();
        (cache, r1, r2)
    }

    #[test]
    fn test_registry_order_decides_between_mirrors() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, r1, r2) = setup(&temp_dir);
        let resolver = Resolver::new(&cache);
        let lib = Dependency::new("org.example", "lib", "1.0.0");

        let forward = resolver.resolve(&lib, &[r1.clone(), r2.clone()]).unwrap();
        assert_eq!(forward.artifact_url(), "https://a1.example/lib.jar");
        assert_eq!(forward.registry(), &r1);

        let reverse = resolver.resolve(&lib, &[r2.clone(), r1.clone()]).unwrap();
        assert_eq!(reverse.artifact_url(), "https://a2.example/lib.jar");
        assert_eq!(reverse.registry(), &r2);

        assert_eq!(forward.signature, reverse.signature);
        assert_eq!(forward.signature, Signature::compute("org.example", "lib", "1.0.0"));
    }

    #[test]
    fn test_falls_through_to_lower_priority_registry() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, r1, r2) = setup(&temp_dir);

        let resolved = Resolver::new(&cache)
            .resolve(&Dependency::new("org.example", "only-two", "1.0.0"), &[r1, r2.clone()])
            .unwrap();
        assert_eq!(resolved.registry(), &r2);
    }

    #[test]
    fn test_unresolved_names_every_registry_searched() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, r1, r2) = setup(&temp_dir);

        let err = Resolver::new(&cache)
            .resolve(&Dependency::new("org.example", "lib", "9.9.9"), &[r1, r2])
            .unwrap_err();

        match &err {
            ResolveError::Unresolved { coordinate, searched } => {
                assert_eq!(coordinate, "org.example:lib:9.9.9");
                assert_eq!(searched, &vec!["r1".to_string(), "r2".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("r1, r2"));
    }

    #[test]
    fn test_version_match_is_exact_string_equality() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, r1, _) = setup(&temp_dir);

        let result = Resolver::new(&cache).resolve(&Dependency::new("org.example", "lib", "1.0"), &[r1]);
        assert!(matches!(result, Err(ResolveError::Unresolved { .. })));
    }

    #[test]
    fn test_uncached_registry_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, r1, _) = setup(&temp_dir);
        let missing = Registry::new("missing", "https://missing.example/archive.zip");

        let result = Resolver::new(&cache).resolve(&Dependency::new("org.example", "lib", "1.0.0"), &[missing, r1]);
        assert!(matches!(result, Err(ResolveError::Registry(_))));
    }

    #[test]
    fn test_dependency_name_must_stay_inside_libs() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, r1, _) = setup(&temp_dir);

        for name in ["", "../victim", "/abs"] {
            let result = Resolver::new(&cache).resolve(&Dependency::new("org.example", name, "1.0.0"), &[r1.clone()]);
            assert!(matches!(
                result,
                Err(ResolveError::Registry(RegistryError::InvalidName { kind: "dependency", .. }))
            ));
        }
    }
}
