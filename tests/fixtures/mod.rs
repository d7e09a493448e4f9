//! Shared fixtures for integration tests: in-memory registries, a counting
//! fetcher and a recording toolchain.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use espresso::config::ProjectConfig;
use espresso::{Cancellation, CompileRequest, Context, EspressoError, EspressoResult, PackageRequest, Service, Toolchain};
use espresso_registry::{Dependency, Registry};
use espresso_store::{Fetch, FetchError, FetchResult};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Zip archive of a registry; each `(group, name, version, artifact_url)`
/// adds a version to that package's declaration.
pub fn registry_archive(versions: &[(&str, &str, &str, &str)]) -> Vec<u8> {
    let mut packages: Vec<((&str, &str), String)> = Vec::new();
    for (group, name, number, url) in versions {
        let entry = format!("  - number: \"{}\"\n    artifactUrl: {}\n", number, url);
        match packages.iter_mut().find(|(key, _)| *key == (*group, *name)) {
            Some((_, yaml)) => yaml.push_str(&entry),
            None => packages.push((
                (*group, *name),
                format!("name: {}\ndescription: The {} package\nversions:\n{}", name, name, entry),
            )),
        }
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .add_directory("espresso-registry-main/", SimpleFileOptions::default())
        .unwrap();
    for ((group, name), yaml) in &packages {
        writer
            .start_file(
                format!("espresso-registry-main/packages/{}/{}.yml", group, name),
                SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(yaml.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Fetcher serving fixed bodies, counting requests per URL.
#[derive(Default)]
pub struct FakeNetwork {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
    total: AtomicUsize,
}

impl FakeNetwork {
    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url.to_string(), body);
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

impl Fetch for FakeNetwork {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> FetchResult<u64> {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(url.to_string());
        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound { url: url.to_string() })?;
        sink.write_all(&body).unwrap();
        Ok(body.len() as u64)
    }
}

/// Toolchain that records every request and fails compiling files whose
/// name contains `Broken`.
#[derive(Default)]
pub struct RecordingToolchain {
    pub compiled: Mutex<Vec<CompileRequest>>,
    pub packaged: Mutex<Vec<PackageRequest>>,
}

impl Toolchain for RecordingToolchain {
    fn compile(&self, request: &CompileRequest) -> EspressoResult<()> {
        self.compiled.lock().unwrap().push(request.clone());
        let file_name = request.source.file_name().unwrap().to_string_lossy().into_owned();
        if file_name.contains("Broken") {
            return Err(EspressoError::Compile {
                path: request.source.clone(),
                output: format!("{}:1: error: ';' expected", file_name),
            });
        }
        Ok(())
    }

    fn package(&self, request: &PackageRequest) -> EspressoResult<()> {
        self.packaged.lock().unwrap().push(request.clone());
        fs::write(&request.archive, b"PK fake archive").unwrap();
        Ok(())
    }
}

/// A project tree in a temp dir with its own espresso home.
pub struct Project {
    pub temp_dir: TempDir,
    pub network: Arc<FakeNetwork>,
    pub service: Service,
}

impl Project {
    pub fn new(registries: &[Registry], dependencies: &[Dependency]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let network = Arc::new(FakeNetwork::default());
        let ctx = Context::new(temp_dir.path().join("project"), temp_dir.path().join("home"), false);

        let mut config = ProjectConfig::new("hello", "org.example.hello");
        config.registries = registries.to_vec();
        config.dependencies = dependencies.to_vec();
        config.persist(&ctx.paths().config).unwrap();

        let service = Service::new(ctx, network.clone(), Cancellation::new());
        Self {
            temp_dir,
            network,
            service,
        }
    }

    pub fn write_source(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.service.context().paths().source_root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn populate(&self, registry: &Registry) {
        self.service.registries().populate(registry).unwrap();
    }

    pub fn home(&self) -> &Path {
        self.service.context().home()
    }
}
