//! Explicit invocation context
//!
//! Built once by the binary and passed to every service. Tests build their
//! own with [`Context::new`] so nothing reads process-wide state.

use std::env;
use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE;
use crate::error::{EspressoError, EspressoResult};

/// Setting this to `1` moves every project path under [`DEBUG_DIR`]
pub const DEBUG_ENV: &str = "ESPRESSO_DEBUG";

/// Overrides the espresso home directory (default `~/.espresso`)
pub const HOME_ENV: &str = "ESPRESSO_HOME";

pub const DEBUG_DIR: &str = "ESPRESSO_DEBUG";

pub const REGISTRIES_DIR: &str = "registries";
pub const CACHED_PACKAGES_DIR: &str = "cachedPackages";

/// Paths inside one project, already adjusted for debug mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub source_root: PathBuf,
    pub build: PathBuf,
    pub dist: PathBuf,
    pub dist_libs: PathBuf,
    pub manifest: PathBuf,
    pub archive: PathBuf,
}

impl ProjectPaths {
    pub fn new(base: &Path) -> Self {
        let build = base.join("build");
        let dist = base.join("dist");
        Self {
            root: base.to_path_buf(),
            config: base.join(CONFIG_FILE),
            source_root: base.join("src").join("java"),
            manifest: build.join("MANIFEST.MF"),
            archive: dist.join("dist.jar"),
            dist_libs: dist.join("libs"),
            build,
            dist,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    debug: bool,
    home: PathBuf,
    paths: ProjectPaths,
}

impl Context {
    pub fn new(project_root: impl AsRef<Path>, home: impl Into<PathBuf>, debug: bool) -> Self {
        let project_root = project_root.as_ref();
        let base = if debug {
            project_root.join(DEBUG_DIR)
        } else {
            project_root.to_path_buf()
        };

        Self {
            debug,
            home: home.into(),
            paths: ProjectPaths::new(&base),
        }
    }

    /// Build a context from the working directory and environment.
    pub fn from_env() -> EspressoResult<Self> {
        let cwd = env::current_dir().map_err(EspressoError::io("."))?;
        let debug = env::var(DEBUG_ENV).map(|v| v == "1").unwrap_or(false);
        let home = match env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => PathBuf::from(home),
            _ => directories::BaseDirs::new()
                .map(|dirs| dirs.home_dir().join(".espresso"))
                .ok_or_else(|| EspressoError::Configuration("could not determine home directory".into()))?,
        };

        if debug {
            tracing::debug!("debug mode: project paths under {}", DEBUG_DIR);
        }
        Ok(Self::new(cwd, home, debug))
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Shared registry cache root
    pub fn registries_root(&self) -> PathBuf {
        self.home.join(REGISTRIES_DIR)
    }

    /// Shared artifact cache root
    pub fn artifacts_root(&self) -> PathBuf {
        self.home.join(CACHED_PACKAGES_DIR)
    }
}
