//! Signature-keyed artifact cache
//!
//! `<root>/<signature>.jar` holds the downloaded binary of one resolved
//! dependency. Existence of that file is trusted as a cache hit; contents are
//! never re-verified.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use espresso_registry::ResolvedDependency;
use espresso_store::{download_atomic, CacheLock, Fetch, DEFAULT_LOCK_TIMEOUT};

use crate::error::{EspressoError, EspressoResult};

/// Artifact file extension
pub const ARTIFACT_EXTENSION: &str = "jar";

#[derive(Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    fetcher: Arc<dyn Fetch>,
    lock_timeout: Duration,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            root: root.into(),
            fetcher,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_path(&self, resolved: &ResolvedDependency) -> PathBuf {
        self.root
            .join(format!("{}.{}", resolved.signature, ARTIFACT_EXTENSION))
    }

    /// Make sure the artifact for `resolved` is on disk, downloading it at most once.
    pub fn ensure(&self, resolved: &ResolvedDependency) -> EspressoResult<PathBuf> {
        let path = self.cache_path(resolved);
        let _lock = CacheLock::guard(&path, self.lock_timeout)?;

        if path.exists() {
            tracing::debug!(dependency = %resolved.requested, "artifact cache hit");
            return Ok(path);
        }

        tracing::info!(
            dependency = %resolved.requested,
            registry = %resolved.registry().name,
            url = resolved.artifact_url(),
            "downloading artifact"
        );
        download_atomic(self.fetcher.as_ref(), resolved.artifact_url(), &path).map_err(|source| {
            EspressoError::Network {
                dependency: resolved.requested.to_string(),
                source,
            }
        })?;

        Ok(path)
    }
}
