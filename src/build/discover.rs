use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{EspressoError, EspressoResult};

/// Source file extension picked up by discovery
pub const SOURCE_EXTENSION: &str = "java";

/// A discovered source file, read once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

/// Every `.java` file below `source_root`, sorted by path and read eagerly.
pub fn discover(source_root: &Path) -> EspressoResult<Vec<SourceFile>> {
    if !source_root.is_dir() {
        return Err(EspressoError::Configuration(format!(
            "source root {} does not exist",
            source_root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source_root).sort_by_file_name() {
        let entry = entry?;
        let is_source = entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION);
        if !is_source {
            continue;
        }

        let content = fs::read_to_string(entry.path()).map_err(EspressoError::io(entry.path()))?;
        files.push(SourceFile {
            path: entry.into_path(),
            content,
        });
    }

    tracing::debug!(root = %source_root.display(), files = files.len(), "sources discovered");
    Ok(files)
}
