//! External compiler and archiver
//!
//! The build talks to the JDK only through the [`Toolchain`] trait. The
//! production [`JdkToolchain`] runs `<toolchain>/bin/javac` and
//! `<toolchain>/bin/jar` as subprocesses and surfaces their combined output
//! verbatim when they exit nonzero.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ToolchainConfig;
use crate::error::{EspressoError, EspressoResult};

/// Placeholder expanded from the environment in `toolchain.path`
pub const JAVA_HOME_VAR: &str = "${JAVA_HOME}";

/// Compile one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    pub source: PathBuf,
    /// Source root first, then every dependency artifact
    pub classpath: Vec<PathBuf>,
    pub output_dir: PathBuf,
}

/// Package compiled classes into an archive with a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub archive: PathBuf,
    pub manifest: PathBuf,
    pub classes_dir: PathBuf,
}

pub trait Toolchain: Send + Sync {
    fn compile(&self, request: &CompileRequest) -> EspressoResult<()>;
    fn package(&self, request: &PackageRequest) -> EspressoResult<()>;
}

/// JDK located by the project's toolchain path.
#[derive(Debug, Clone)]
pub struct JdkToolchain {
    home: PathBuf,
}

impl JdkToolchain {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Resolve the toolchain path, expanding `${JAVA_HOME}` from the environment.
    pub fn from_config(config: &ToolchainConfig) -> EspressoResult<Self> {
        let home = expand_toolchain_path(&config.path, |name| env::var(name).ok())?;
        Ok(Self::new(home))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn compiler(&self) -> PathBuf {
        self.home.join("bin").join("javac")
    }

    pub fn archiver(&self) -> PathBuf {
        self.home.join("bin").join("jar")
    }
}

impl Toolchain for JdkToolchain {
    fn compile(&self, request: &CompileRequest) -> EspressoResult<()> {
        let classpath = env::join_paths(&request.classpath)
            .map_err(|e| EspressoError::Configuration(format!("invalid classpath entry: {}", e)))?;

        let args: Vec<&OsStr> = vec![
            OsStr::new("-cp"),
            classpath.as_os_str(),
            OsStr::new("-d"),
            request.output_dir.as_os_str(),
            request.source.as_os_str(),
        ];

        tracing::debug!(source = %request.source.display(), "javac");
        run(&self.compiler(), &args).and_then(|outcome| match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed(output) => Err(EspressoError::Compile {
                path: request.source.clone(),
                output,
            }),
        })
    }

    fn package(&self, request: &PackageRequest) -> EspressoResult<()> {
        let args: Vec<&OsStr> = vec![
            OsStr::new("cfm"),
            request.archive.as_os_str(),
            request.manifest.as_os_str(),
            OsStr::new("-C"),
            request.classes_dir.as_os_str(),
            OsStr::new("."),
        ];

        tracing::debug!(archive = %request.archive.display(), "jar");
        run(&self.archiver(), &args).and_then(|outcome| match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed(output) => Err(EspressoError::Package {
                archive: request.archive.clone(),
                output,
            }),
        })
    }
}

enum Outcome {
    Success,
    /// Combined stdout and stderr of the failed process
    Failed(String),
}

fn run(program: &Path, args: &[&OsStr]) -> EspressoResult<Outcome> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| EspressoError::Tool {
            program: program.to_path_buf(),
            source,
        })?;

    if output.status.success() {
        return Ok(Outcome::Success);
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(Outcome::Failed(combined))
}

/// Expand `${JAVA_HOME}` in `path` using `lookup`.
///
/// An empty path, or one that expands to nothing, is a configuration error.
pub fn expand_toolchain_path(path: &str, lookup: impl Fn(&str) -> Option<String>) -> EspressoResult<PathBuf> {
    let expanded = if path.contains(JAVA_HOME_VAR) {
        let java_home = lookup("JAVA_HOME")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EspressoError::Configuration("toolchain path uses ${JAVA_HOME} but JAVA_HOME is not set".into()))?;
        path.replace(JAVA_HOME_VAR, &java_home)
    } else {
        path.to_string()
    };

    if expanded.trim().is_empty() {
        return Err(EspressoError::Configuration("toolchain path is not set".into()));
    }
    Ok(PathBuf::from(OsString::from(expanded)))
}
