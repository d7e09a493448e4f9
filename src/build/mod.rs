//! Build pipeline
//!
//! ```text
//! Discover -> ResolveAndEnsure -> CompileAll -> GenerateManifest -> Package -> CopyArtifacts
//! ```
//!
//! Every parallel stage joins before the next one starts. Any stage failure
//! aborts the build; nothing is retried.

pub mod discover;
pub mod manifest;
pub mod parallel;

use std::fs;
use std::path::PathBuf;

use espresso_registry::{RegistryCache, ResolvedDependency, Resolver};

use crate::artifact::ArtifactCache;
use crate::config::ProjectConfig;
use crate::context::ProjectPaths;
use crate::error::{EspressoError, EspressoResult};
use crate::signal::Cancellation;
use crate::toolchain::{CompileRequest, PackageRequest, Toolchain};

pub use discover::{discover, SourceFile};
pub use parallel::WorkerPool;

/// What a finished build produced.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub archive: PathBuf,
    pub manifest: PathBuf,
    pub sources: usize,
    pub dependencies: Vec<ResolvedDependency>,
}

pub struct BuildOrchestrator<'a> {
    pub config: &'a ProjectConfig,
    pub paths: &'a ProjectPaths,
    pub registries: &'a RegistryCache,
    pub artifacts: &'a ArtifactCache,
    pub toolchain: &'a dyn Toolchain,
    pub pool: &'a WorkerPool,
    pub cancellation: &'a Cancellation,
}

impl BuildOrchestrator<'_> {
    pub fn run(&self) -> EspressoResult<BuildOutput> {
        tracing::info!(project = %self.config.name, version = %self.config.version, "building");

        let sources = discover(&self.paths.source_root)?;
        tracing::info!(files = sources.len(), "discovered sources");

        let resolved = self.resolve_and_ensure()?;
        let classpath = self.classpath(&resolved);

        self.compile_all(&sources, &classpath)?;

        let dependencies: Vec<ResolvedDependency> = resolved.into_iter().map(|(dep, _)| dep).collect();
        self.write_manifest(&dependencies)?;
        self.package()?;
        self.copy_artifacts(&dependencies)?;

        tracing::info!(archive = %self.paths.archive.display(), "build complete");
        Ok(BuildOutput {
            archive: self.paths.archive.clone(),
            manifest: self.paths.manifest.clone(),
            sources: sources.len(),
            dependencies,
        })
    }

    /// Resolve every declared dependency and make sure its artifact is cached.
    pub fn resolve_and_ensure(&self) -> EspressoResult<Vec<(ResolvedDependency, PathBuf)>> {
        resolve_and_ensure(
            self.config,
            self.registries,
            self.artifacts,
            self.pool,
            self.cancellation,
        )
    }

    fn classpath(&self, resolved: &[(ResolvedDependency, PathBuf)]) -> Vec<PathBuf> {
        let mut classpath = Vec::with_capacity(resolved.len() + 1);
        classpath.push(self.paths.source_root.clone());
        classpath.extend(resolved.iter().map(|(_, path)| path.clone()));
        classpath
    }

    fn compile_all(&self, sources: &[SourceFile], classpath: &[PathBuf]) -> EspressoResult<()> {
        fs::create_dir_all(&self.paths.build).map_err(EspressoError::io(&self.paths.build))?;

        self.pool.fan_out(
            "compile",
            sources,
            self.cancellation,
            |source| source.path.display().to_string(),
            |source| {
                tracing::debug!(file = %source.path.display(), "compiling");
                self.toolchain.compile(&CompileRequest {
                    source: source.path.clone(),
                    classpath: classpath.to_vec(),
                    output_dir: self.paths.build.clone(),
                })
            },
        )?;

        tracing::info!(files = sources.len(), "compiled");
        Ok(())
    }

    fn write_manifest(&self, dependencies: &[ResolvedDependency]) -> EspressoResult<()> {
        let tokens = manifest::class_path_tokens(dependencies);
        let text = manifest::generate(&self.config.base_package, &tokens)?;

        let path = &self.paths.manifest;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(EspressoError::io(parent))?;
        }
        fs::write(path, text).map_err(EspressoError::io(path))?;
        tracing::debug!(path = %path.display(), "manifest written");
        Ok(())
    }

    fn package(&self) -> EspressoResult<()> {
        fs::create_dir_all(&self.paths.dist).map_err(EspressoError::io(&self.paths.dist))?;

        if self.cancellation.is_cancelled() {
            return Err(EspressoError::Cancelled);
        }
        self.toolchain.package(&PackageRequest {
            archive: self.paths.archive.clone(),
            manifest: self.paths.manifest.clone(),
            classes_dir: self.paths.build.clone(),
        })?;
        tracing::info!(archive = %self.paths.archive.display(), "packaged");
        Ok(())
    }

    fn copy_artifacts(&self, dependencies: &[ResolvedDependency]) -> EspressoResult<()> {
        if dependencies.is_empty() {
            return Ok(());
        }

        let libs = &self.paths.dist_libs;
        fs::create_dir_all(libs).map_err(EspressoError::io(libs))?;

        self.pool.fan_out(
            "copy artifacts",
            dependencies,
            self.cancellation,
            |dep| dep.requested.to_string(),
            |dep| {
                let cached = self.artifacts.ensure(dep)?;
                let target = libs.join(format!("{}.jar", dep.requested.name));
                fs::copy(&cached, &target).map_err(EspressoError::io(&target))?;
                tracing::debug!(dependency = %dep.requested, target = %target.display(), "artifact copied");
                Ok(())
            },
        )?;

        tracing::info!(count = dependencies.len(), "artifacts copied");
        Ok(())
    }
}

/// Resolve and cache every dependency of `config`, one task per dependency.
pub fn resolve_and_ensure(
    config: &ProjectConfig,
    registries: &RegistryCache,
    artifacts: &ArtifactCache,
    pool: &WorkerPool,
    cancellation: &Cancellation,
) -> EspressoResult<Vec<(ResolvedDependency, PathBuf)>> {
    let resolver = Resolver::new(registries);

    let resolved = pool.fan_out(
        "resolve dependencies",
        &config.dependencies,
        cancellation,
        |dep| dep.to_string(),
        |dep| {
            let resolved = resolver.resolve(dep, &config.registries)?;
            let path = artifacts.ensure(&resolved)?;
            Ok((resolved, path))
        },
    )?;

    if !resolved.is_empty() {
        tracing::info!(count = resolved.len(), "dependencies resolved");
    }
    Ok(resolved)
}
