//! Operations behind each CLI command

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use espresso_registry::{Catalog, RegistryCache, ResolvedDependency};
use espresso_store::Fetch;
use serde::Serialize;

use crate::artifact::ArtifactCache;
use crate::build::{self, BuildOrchestrator, BuildOutput, WorkerPool};
use crate::config::{self, ProjectConfig};
use crate::context::Context;
use crate::error::{EspressoError, EspressoResult};
use crate::signal::Cancellation;
use crate::toolchain::Toolchain;

/// One row of `registry query` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryHit {
    pub registry: String,
    pub group: String,
    pub name: String,
    pub latest_version: Option<String>,
    pub description: String,
}

/// Caches and context shared by every command of one invocation.
pub struct Service {
    ctx: Context,
    registries: RegistryCache,
    artifacts: ArtifactCache,
    cancellation: Cancellation,
}

impl Service {
    pub fn new(ctx: Context, fetcher: Arc<dyn Fetch>, cancellation: Cancellation) -> Self {
        let registries = RegistryCache::new(ctx.registries_root(), fetcher.clone());
        let artifacts = ArtifactCache::new(ctx.artifacts_root(), fetcher);
        Self {
            ctx,
            registries,
            artifacts,
            cancellation,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn registries(&self) -> &RegistryCache {
        &self.registries
    }

    pub fn artifacts(&self) -> &ArtifactCache {
        &self.artifacts
    }

    pub fn load_config(&self) -> EspressoResult<ProjectConfig> {
        let path = &self.ctx.paths().config;
        if !path.exists() {
            return Err(EspressoError::Configuration(format!(
                "no project found ({} is missing); run `espresso init`",
                path.display()
            )));
        }
        ProjectConfig::load(path)
    }

    /// Create `espresso.toml` and an example `Main` class.
    pub fn init(&self, name: Option<String>, base_package: Option<String>) -> EspressoResult<ProjectConfig> {
        let paths = self.ctx.paths();
        if paths.config.exists() {
            return Err(EspressoError::ProjectExists {
                path: paths.config.clone(),
            });
        }

        let name = name
            .or_else(|| directory_name(&paths.root))
            .unwrap_or_else(|| "espresso-project".to_string());
        let base_package = base_package.unwrap_or_else(|| format!("org.example.{}", package_segment(&name)));
        let config = ProjectConfig::new(name, base_package);
        config.validate()?;

        if std::env::var("JAVA_HOME").map(|v| v.is_empty()).unwrap_or(true) {
            tracing::warn!("JAVA_HOME is not set; set it or edit toolchain.path before building");
        }

        let package_dir = config
            .base_package
            .split('.')
            .fold(paths.source_root.clone(), |dir, segment| dir.join(segment));
        fs::create_dir_all(&package_dir).map_err(EspressoError::io(&package_dir))?;
        let main = package_dir.join("Main.java");
        fs::write(&main, config::main_class_source(&config.base_package)).map_err(EspressoError::io(&main))?;

        config.persist(&paths.config)?;
        tracing::info!(project = %config.name, path = %paths.config.display(), "project created");
        Ok(config)
    }

    /// Remove the build and dist directories.
    pub fn clean(&self) -> EspressoResult<()> {
        let paths = self.ctx.paths();
        for dir in [&paths.build, &paths.dist] {
            match fs::remove_dir_all(dir) {
                Ok(()) => tracing::debug!(path = %dir.display(), "removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(EspressoError::Io { path: dir.clone(), source: e }),
            }
        }
        tracing::info!("cleaned");
        Ok(())
    }

    /// Search every registry, in priority order, for packages matching `term`.
    pub fn query(&self, term: &str) -> EspressoResult<Vec<QueryHit>> {
        let config = self.load_config()?;

        let mut hits = Vec::new();
        for registry in &config.registries {
            tracing::debug!(registry = %registry.name, "searching");
            let catalog = Catalog::load(&self.registries, registry)?;
            hits.extend(catalog.search(term).into_iter().map(|package| QueryHit {
                registry: registry.name.clone(),
                group: package.group.clone(),
                name: package.name.clone(),
                latest_version: package.latest_version().map(|v| v.number.clone()),
                description: package.description.clone(),
            }));
        }
        Ok(hits)
    }

    /// Drop every registry cache, then download each registry again.
    pub fn invalidate_registries(&self, jobs: Option<usize>) -> EspressoResult<()> {
        let config = self.load_config()?;
        let pool = self.pool(&config, jobs)?;

        pool.fan_out(
            "invalidate registries",
            &config.registries,
            &self.cancellation,
            |r| r.name.clone(),
            |r| Ok(self.registries.invalidate(r)?),
        )?;
        let populated = pool.fan_out(
            "populate registries",
            &config.registries,
            &self.cancellation,
            |r| r.name.clone(),
            |r| Ok(self.registries.populate(r)?),
        )?;

        tracing::info!(count = populated.len(), "registries refreshed");
        Ok(())
    }

    /// Resolve every dependency and download any artifact not yet cached.
    pub fn sync_dependencies(&self, jobs: Option<usize>) -> EspressoResult<Vec<ResolvedDependency>> {
        let config = self.load_config()?;
        let pool = self.pool(&config, jobs)?;

        let resolved = build::resolve_and_ensure(&config, &self.registries, &self.artifacts, &pool, &self.cancellation)?;
        Ok(resolved.into_iter().map(|(dep, _)| dep).collect())
    }

    pub fn build(&self, toolchain: &dyn Toolchain, jobs: Option<usize>) -> EspressoResult<BuildOutput> {
        let config = self.load_config()?;
        self.build_with_config(&config, toolchain, jobs)
    }

    pub fn build_with_config(
        &self,
        config: &ProjectConfig,
        toolchain: &dyn Toolchain,
        jobs: Option<usize>,
    ) -> EspressoResult<BuildOutput> {
        let pool = self.pool(config, jobs)?;
        tracing::debug!(jobs = pool.jobs(), "worker pool ready");

        BuildOrchestrator {
            config,
            paths: self.ctx.paths(),
            registries: &self.registries,
            artifacts: &self.artifacts,
            toolchain,
            pool: &pool,
            cancellation: &self.cancellation,
        }
        .run()
    }

    fn pool(&self, config: &ProjectConfig, jobs: Option<usize>) -> EspressoResult<WorkerPool> {
        WorkerPool::new(jobs.or(config.build.jobs))
    }
}

fn directory_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Lowercase identifier-safe form of a project name.
fn package_segment(name: &str) -> String {
    let segment: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    match segment.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => segment,
        Some(_) => format!("p{}", segment),
        None => "app".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espresso_store::{FetchError, FetchResult};
    use std::io::Write;
    use tempfile::TempDir;

    struct NoNetwork;

    impl Fetch for NoNetwork {
        fn fetch(&self, url: &str, _sink: &mut dyn Write) -> FetchResult<u64> {
            Err(FetchError::NotFound { url: url.to_string() })
        }
    }

    fn service(temp_dir: &TempDir) -> Service {
        let ctx = Context::new(temp_dir.path().join("hello-world"), temp_dir.path().join("home"), false);
        Service::new(ctx, Arc::new(NoNetwork), Cancellation::new())
    }

    #[test]
    fn test_init_writes_config_and_example() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        let config = service.init(None, None).unwrap();

        assert_eq!(config.name, "hello-world");
        assert_eq!(config.base_package, "org.example.helloworld");
        let paths = service.context().paths();
        assert_eq!(ProjectConfig::load(&paths.config).unwrap(), config);
        let main = fs::read_to_string(paths.source_root.join("org/example/helloworld/Main.java")).unwrap();
        assert!(main.starts_with("package org.example.helloworld;"));
    }

    #[test]
    fn test_init_refuses_existing_project() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        service.init(Some("a".into()), Some("org.a".into())).unwrap();
        let err = service.init(Some("b".into()), Some("org.b".into())).unwrap_err();

        assert!(matches!(err, EspressoError::ProjectExists { .. }));
        assert_eq!(service.load_config().unwrap().name, "a");
    }

    #[test]
    fn test_clean_removes_outputs_and_tolerates_absence() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);
        let paths = service.context().paths().clone();

        service.clean().unwrap();

        fs::create_dir_all(paths.build.join("org")).unwrap();
        fs::create_dir_all(&paths.dist_libs).unwrap();
        fs::write(&paths.archive, b"jar").unwrap();
        service.clean().unwrap();

        assert!(!paths.build.exists());
        assert!(!paths.dist.exists());
    }

    #[test]
    fn test_commands_without_project_fail() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(&temp_dir);

        let err = service.query("*").unwrap_err();
        assert!(matches!(err, EspressoError::Configuration(_)));
        assert!(err.to_string().contains("espresso init"));
    }

    #[test]
    fn test_package_segment() {
        assert_eq!(package_segment("Hello-World"), "helloworld");
        assert_eq!(package_segment("3d-engine"), "p3dengine");
        assert_eq!(package_segment("---"), "app");
    }
}
