//! On-disk registry cache
//!
//! Layout under the cache root (normally `~/.espresso/registries`):
//!
//! ```text
//! <root>/.<registry>.lock          advisory lock for invalidate/populate
//! <root>/<registry>/archive.zip    downloaded registry archive
//! <root>/<registry>/lookup/...     extracted tree
//! ```
//!
//! Presence of `<root>/<registry>` is the only "cached" signal, so populate
//! builds everything in a hidden staging directory and renames it into place
//! once download and extraction have both succeeded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use espresso_store::{download_atomic, CacheLock, Fetch, DEFAULT_LOCK_TIMEOUT};
use walkdir::WalkDir;

use crate::archive;
use crate::error::{RegistryError, RegistryResult};
use crate::model::Registry;

/// File name of the downloaded archive inside a registry cache
pub const ARCHIVE_FILE: &str = "archive.zip";

/// Directory the archive is extracted into
pub const LOOKUP_DIR: &str = "lookup";

/// Package metadata directory inside the extracted tree
pub const METADATA_DIR: &str = "packages";

/// File extensions recognised as package declarations
pub const DECLARATION_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Registry cache rooted at a directory shared by every project.
#[derive(Clone)]
pub struct RegistryCache {
    root: PathBuf,
    fetcher: Arc<dyn Fetch>,
    lock_timeout: Duration,
}

impl RegistryCache {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            root: root.into(),
            fetcher,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Set how long populate/invalidate wait on a contended lock
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<registry name>`; a name that is not a single path segment
    /// is rejected so nothing outside the root is ever touched.
    pub fn cache_path(&self, registry: &Registry) -> RegistryResult<PathBuf> {
        if !registry.has_valid_name() {
            return Err(RegistryError::InvalidName {
                kind: "registry",
                name: registry.name.clone(),
            });
        }
        Ok(self.root.join(&registry.name))
    }

    pub fn is_cached(&self, registry: &Registry) -> bool {
        self.cache_path(registry).map(|path| path.exists()).unwrap_or(false)
    }

    /// Delete the registry's cache directory. Deleting an absent cache is not an error.
    pub fn invalidate(&self, registry: &Registry) -> RegistryResult<()> {
        let path = self.cache_path(registry)?;
        let _lock = CacheLock::guard(&path, self.lock_timeout)?;

        match fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::info!(registry = %registry.name, path = %path.display(), "registry cache invalidated");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(registry = %registry.name, "registry cache already absent");
                Ok(())
            }
            Err(e) => Err(RegistryError::Io { path, source: e }),
        }
    }

    /// Download and extract the registry archive into its cache directory.
    ///
    /// Fails with `CacheState` if the cache already exists. A missing package
    /// metadata directory is logged but does not fail the populate.
    pub fn populate(&self, registry: &Registry) -> RegistryResult<PathBuf> {
        let path = self.cache_path(registry)?;
        let _lock = CacheLock::guard(&path, self.lock_timeout)?;

        if path.exists() {
            return Err(RegistryError::CacheState {
                registry: registry.name.clone(),
                path,
            });
        }

        fs::create_dir_all(&self.root).map_err(RegistryError::io(&self.root))?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.staging-", registry.name))
            .tempdir_in(&self.root)
            .map_err(RegistryError::io(&self.root))?;

        let archive_path = staging.path().join(ARCHIVE_FILE);
        tracing::info!(registry = %registry.name, url = %registry.url, "downloading registry archive");
        download_atomic(self.fetcher.as_ref(), &registry.url, &archive_path).map_err(|source| {
            RegistryError::Network {
                registry: registry.name.clone(),
                source,
            }
        })?;

        let lookup = staging.path().join(LOOKUP_DIR);
        let files = archive::extract(&archive_path, &lookup)?;

        if find_metadata_dir(&lookup).is_none() {
            tracing::warn!(
                registry = %registry.name,
                "registry lookup appears invalid: no '{}' directory",
                METADATA_DIR
            );
        }

        // The staging directory is gone after the rename, so dropping the
        // handle afterwards has nothing left to remove.
        fs::rename(staging.path(), &path).map_err(RegistryError::io(&path))?;
        drop(staging);

        tracing::info!(registry = %registry.name, files, path = %path.display(), "registry cached");
        Ok(path)
    }

    /// Locate the package metadata directory of a cached registry.
    pub fn metadata_dir(&self, registry: &Registry) -> RegistryResult<PathBuf> {
        let path = self.cache_path(registry)?;
        if !path.is_dir() {
            return Err(RegistryError::NotCached {
                registry: registry.name.clone(),
                path,
            });
        }

        let lookup = path.join(LOOKUP_DIR);
        find_metadata_dir(&lookup).ok_or_else(|| RegistryError::MissingMetadata {
            registry: registry.name.clone(),
            lookup,
        })
    }

    /// One path per immediate group directory, sorted by name.
    pub fn list_package_groups(&self, registry: &Registry) -> RegistryResult<Vec<PathBuf>> {
        let metadata = self.metadata_dir(registry)?;

        let mut groups = Vec::new();
        for entry in WalkDir::new(&metadata).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                groups.push(entry.into_path());
            }
        }
        Ok(groups)
    }

    /// One path per declaration file below `group_path`, sorted by name.
    pub fn list_declaration_files(group_path: &Path) -> RegistryResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(group_path).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() && is_declaration(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

fn is_declaration(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| DECLARATION_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// `lookup/packages`, or `lookup/<top>/packages` for archives that wrap their
/// tree in a single top-level directory (e.g. `espresso-registry-main/`).
fn find_metadata_dir(lookup: &Path) -> Option<PathBuf> {
    let direct = lookup.join(METADATA_DIR);
    if direct.is_dir() {
        return Some(direct);
    }

    let mut tops: Vec<PathBuf> = fs::read_dir(lookup)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    tops.sort();

    tops.into_iter()
        .map(|top| top.join(METADATA_DIR))
        .find(|candidate| candidate.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{zip_bytes, MapFetcher};
    use tempfile::TempDir;

    const URL: &str = "https://registry.example/archive.zip";

    fn registry() -> Registry {
        Registry::new("test-registry", URL)
    }

    fn cache_with(temp_dir: &TempDir, body: Vec<u8>) -> (RegistryCache, Arc<MapFetcher>) {
        let fetcher = Arc::new(MapFetcher::default().with(URL, body));
        let cache = RegistryCache::new(temp_dir.path().join("registries"), fetcher.clone())
            .with_lock_timeout(Duration::from_secs(5));
        (cache, fetcher)
    }

    fn standard_archive() -> Vec<u8> {
        zip_bytes(&[
            ("registry-main/", None),
            ("registry-main/packages/", None),
            ("registry-main/packages/org.example/", None),
            ("registry-main/packages/org.example/lib.yml", Some("versions: []\n")),
            ("registry-main/packages/org.example/README.md", Some("not a declaration")),
            ("registry-main/packages/com.acme/", None),
        ])
    }

    #[test]
    fn test_cache_path_is_root_plus_name() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, _) = cache_with(&temp_dir, Vec::new());
        assert_eq!(
            cache.cache_path(&registry()).unwrap(),
            temp_dir.path().join("registries").join("test-registry")
        );
    }

    #[test]
    fn test_populate_lays_out_archive_and_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, fetcher) = cache_with(&temp_dir, standard_archive());

        let path = cache.populate(&registry()).unwrap();

        assert_eq!(fetcher.requests(), 1);
        assert!(path.join(ARCHIVE_FILE).is_file());
        assert!(path.join(LOOKUP_DIR).join("registry-main/packages/org.example/lib.yml").is_file());
        assert_eq!(
            cache.metadata_dir(&registry()).unwrap(),
            path.join("lookup/registry-main/packages")
        );
    }

    #[test]
    fn test_populate_refuses_existing_cache() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, fetcher) = cache_with(&temp_dir, standard_archive());

        cache.populate(&registry()).unwrap();
        let err = cache.populate(&registry()).unwrap_err();

        assert!(matches!(err, RegistryError::CacheState { .. }));
        assert!(err.to_string().contains("invalidate"));
        assert_eq!(fetcher.requests(), 1);
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, _) = cache_with(&temp_dir, standard_archive());

        cache.invalidate(&registry()).unwrap();
        cache.populate(&registry()).unwrap();
        cache.invalidate(&registry()).unwrap();
        cache.invalidate(&registry()).unwrap();

        assert!(!cache.is_cached(&registry()));
    }

    #[test]
    fn test_populate_tolerates_missing_metadata_dir() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, _) = cache_with(&temp_dir, zip_bytes(&[("registry-main/README.md", Some("hi"))]));

        cache.populate(&registry()).unwrap();

        assert!(cache.is_cached(&registry()));
        assert!(matches!(
            cache.list_package_groups(&registry()).unwrap_err(),
            RegistryError::MissingMetadata { .. }
        ));
    }

    #[test]
    fn test_illegal_archive_leaves_no_cache_behind() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, _) = cache_with(
            &temp_dir,
            zip_bytes(&[
                ("registry-main/packages/org.example/lib.yml", Some("versions: []\n")),
                ("../../escaped.txt", Some("pwned")),
            ]),
        );

        let err = cache.populate(&registry()).unwrap_err();

        assert!(matches!(err, RegistryError::IllegalPath { .. }));
        assert!(!cache.is_cached(&registry()));
        assert!(!temp_dir.path().join("escaped.txt").exists());
        assert!(!temp_dir.path().join("registries").join("escaped.txt").exists());
        let leftovers: Vec<_> = fs::read_dir(cache.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| !name.ends_with(".lock"))
            .collect();
        assert!(leftovers.is_empty(), "staging not cleaned up: {:?}", leftovers);
    }

    #[test]
    fn test_failed_download_is_network_error() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = Arc::new(MapFetcher::default());
        let cache = RegistryCache::new(temp_dir.path().join("registries"), fetcher);

        let err = cache.populate(&registry()).unwrap_err();

        assert!(matches!(err, RegistryError::Network { .. }));
        assert!(!cache.is_cached(&registry()));
    }

    #[test]
    fn test_listing_is_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, _) = cache_with(&temp_dir, standard_archive());
        cache.populate(&registry()).unwrap();

        let groups = cache.list_package_groups(&registry()).unwrap();
        let names: Vec<_> = groups
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["com.acme", "org.example"]);

        let files = RegistryCache::list_declaration_files(&groups[1]).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("org.example/lib.yml"));
    }

    #[test]
    fn test_listing_uncached_registry_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, _) = cache_with(&temp_dir, standard_archive());

        let err = cache.list_package_groups(&registry()).unwrap_err();
        assert!(matches!(err, RegistryError::NotCached { .. }));
    }

    #[test]
    fn test_names_outside_the_root_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let (cache, fetcher) = cache_with(&temp_dir, standard_archive());
        cache.populate(&registry()).unwrap();
        let victim = temp_dir.path().join("victim");
        fs::create_dir(&victim).unwrap();

        for name in ["", "../victim", "/abs"] {
            let bad = Registry::new(name, URL);
            assert!(matches!(
                cache.invalidate(&bad).unwrap_err(),
                RegistryError::InvalidName { kind: "registry", .. }
            ));
            assert!(matches!(cache.populate(&bad).unwrap_err(), RegistryError::InvalidName { .. }));
            assert!(!cache.is_cached(&bad));
        }

        assert!(cache.is_cached(&registry()));
        assert!(victim.is_dir());
        assert_eq!(fetcher.requests(), 1);
    }

    #[test]
    fn test_concurrent_populate_downloads_once() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = Arc::new(
            MapFetcher::default()
                .with(URL, standard_archive())
                .with_delay(Duration::from_millis(100)),
        );
        let cache = RegistryCache::new(temp_dir.path().join("registries"), fetcher.clone())
            .with_lock_timeout(Duration::from_secs(30));

        let results: Vec<RegistryResult<PathBuf>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..6).map(|_| scope.spawn(|| cache.populate(&registry()))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, RegistryError::CacheState { .. })));
        assert_eq!(fetcher.requests(), 1);
        assert!(cache.is_cached(&registry()));
    }
}
