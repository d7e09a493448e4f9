use std::io;
use std::path::PathBuf;

use espresso_store::{FetchError, LockError};
use thiserror::Error;

/// Registry result type
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Resolution result type
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors from registry cache and catalog operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry '{registry}' is already cached at {path}; invalidate it before caching again")]
    CacheState { registry: String, path: PathBuf },

    #[error("registry '{registry}' is not cached (expected {path}); run `espresso registry invalidate`")]
    NotCached { registry: String, path: PathBuf },

    #[error("registry '{registry}' has no package metadata directory under {lookup}")]
    MissingMetadata { registry: String, lookup: PathBuf },

    #[error("invalid {kind} name '{name}': must be a single path segment")]
    InvalidName { kind: &'static str, name: String },

    #[error("illegal path in archive entry '{entry}': escapes {root}")]
    IllegalPath { entry: String, root: PathBuf },

    #[error("failed to download registry '{registry}': {source}")]
    Network {
        registry: String,
        #[source]
        source: FetchError,
    },

    #[error("invalid registry archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("invalid package declaration {path}: {source}")]
    Declaration {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| RegistryError::Io { path, source }
    }
}

/// Errors from dependency resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("'{coordinate}' could not be resolved in any registry (searched: {})", .searched.join(", "))]
    Unresolved {
        coordinate: String,
        searched: Vec<String>,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
