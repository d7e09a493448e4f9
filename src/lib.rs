//! Espresso - build Java projects from declared package registries
//!
//! A build resolves the project's dependencies against its registries in
//! priority order, caches every artifact once under `~/.espresso`, compiles
//! the sources in parallel and packages them into `dist/dist.jar` with a
//! generated manifest.

pub mod artifact;
pub mod build;
pub mod config;
pub mod context;
pub mod error;
pub mod service;
pub mod signal;
pub mod toolchain;

pub use artifact::ArtifactCache;
pub use build::{BuildOrchestrator, BuildOutput, WorkerPool};
pub use config::ProjectConfig;
pub use context::{Context, ProjectPaths};
pub use error::{EspressoError, EspressoResult, UnitFailure};
pub use service::{QueryHit, Service};
pub use signal::Cancellation;
pub use toolchain::{CompileRequest, JdkToolchain, PackageRequest, Toolchain};
