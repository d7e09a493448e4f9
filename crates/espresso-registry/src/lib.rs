//! Package registries for espresso
//!
//! A registry is a zip archive of YAML package declarations grouped into
//! directories by package group. This crate caches those archives on disk,
//! builds catalogs from the extracted tree and resolves requested coordinates
//! against an ordered list of registries.

pub mod archive;
pub mod cache;
pub mod catalog;
pub mod declaration;
pub mod error;
pub mod model;
pub mod resolver;
pub mod signature;

#[cfg(test)]
mod testutil;

pub use cache::RegistryCache;
pub use catalog::Catalog;
pub use declaration::parse_declaration;
pub use error::{RegistryError, RegistryResult, ResolveError, ResolveResult};
pub use model::{Dependency, Package, PackageDeclaration, PackageVersion, Registry};
pub use resolver::{ResolvedDependency, Resolver};
pub use signature::Signature;
