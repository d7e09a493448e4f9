use std::fs;
use std::path::Path;

use crate::error::{RegistryError, RegistryResult};
use crate::model::PackageDeclaration;

/// Parse the YAML declaration at `path`.
///
/// A declaration without a `name` takes the file stem as its name.
pub fn parse_declaration(path: &Path) -> RegistryResult<PackageDeclaration> {
    let content = fs::read_to_string(path).map_err(RegistryError::io(path))?;
    let mut declaration = if content.trim().is_empty() {
        PackageDeclaration::default()
    } else {
        serde_yaml::from_str::<PackageDeclaration>(&content).map_err(|source| {
            RegistryError::Declaration {
                path: path.to_path_buf(),
                source,
            }
        })?
    };

    if declaration.name.is_empty() {
        declaration.name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
    }

    Ok(declaration)
}
