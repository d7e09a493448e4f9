//! Top-level error type and process exit codes

use std::fmt;
use std::io;
use std::path::PathBuf;

use espresso_registry::{RegistryError, ResolveError};
use espresso_store::{FetchError, LockError};
use thiserror::Error;

use crate::build::manifest::ManifestError;

/// Espresso result type
pub type EspressoResult<T> = Result<T, EspressoError>;

/// Exit code for a run interrupted by SIGINT
pub const EXIT_CODE_CANCELLED: i32 = 130;

#[derive(Debug, Error)]
pub enum EspressoError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize project config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("a project already exists at {path}")]
    ProjectExists { path: PathBuf },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to download artifact for {dependency}: {source}")]
    Network {
        dependency: String,
        #[source]
        source: FetchError,
    },

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("failed to compile {path}:\n{output}")]
    Compile { path: PathBuf, output: String },

    #[error("failed to package {archive}:\n{output}")]
    Package { archive: PathBuf, output: String },

    #[error("failed to run {program}: {source}")]
    Tool {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("{stage} failed:\n{}", Failures(.failures))]
    Stage {
        stage: &'static str,
        failures: Vec<UnitFailure>,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A failure of one unit (a source file or a dependency) inside a parallel stage.
#[derive(Debug)]
pub struct UnitFailure {
    pub unit: String,
    pub error: EspressoError,
}

struct Failures<'a>(&'a [UnitFailure]);

impl fmt::Display for Failures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}: {}", failure.unit, failure.error)?;
        }
        Ok(())
    }
}

impl EspressoError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| EspressoError::Io { path, source }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            EspressoError::Configuration(_)
            | EspressoError::ConfigParse { .. }
            | EspressoError::ConfigSerialize(_)
            | EspressoError::ProjectExists { .. } => 2,
            EspressoError::Registry(e) => registry_exit_code(e),
            EspressoError::Resolve(ResolveError::Unresolved { .. }) => 6,
            EspressoError::Resolve(ResolveError::Registry(e)) => registry_exit_code(e),
            EspressoError::Network { .. } => 5,
            EspressoError::Lock(_) => 9,
            EspressoError::Compile { .. } => 7,
            EspressoError::Package { .. } | EspressoError::Manifest(_) => 8,
            EspressoError::Tool { .. } => 2,
            // The first attributed failure decides the stage's code.
            EspressoError::Stage { failures, .. } => failures.first().map(|f| f.error.exit_code()).unwrap_or(1),
            EspressoError::Cancelled => EXIT_CODE_CANCELLED,
            EspressoError::Io { .. } | EspressoError::Walk(_) | EspressoError::Json(_) | EspressoError::Pool(_) => 1,
        }
    }
}

fn registry_exit_code(error: &RegistryError) -> i32 {
    match error {
        RegistryError::CacheState { .. } => 3,
        RegistryError::IllegalPath { .. } => 4,
        RegistryError::Network { .. } => 5,
        RegistryError::NotCached { .. }
        | RegistryError::MissingMetadata { .. }
        | RegistryError::InvalidName { .. } => 2,
        RegistryError::Lock(_) => 9,
        _ => 1,
    }
}
