//! Registry archive extraction with path confinement
//!
//! Every entry name is resolved lexically against the extraction root before
//! anything is written. An entry that resolves to the root itself or anywhere
//! outside it aborts the whole extraction with `IllegalPath`.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::error::{RegistryError, RegistryResult};

/// Resolve an archive entry name to a path strictly below the extraction root.
///
/// Returns `None` for absolute names, names with a drive/root prefix, names
/// whose `..` components climb above the root, and names that resolve to the
/// root itself.
pub fn confine(entry_name: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    let mut depth = 0usize;

    for component in Path::new(entry_name).components() {
        match component {
            Component::Normal(part) => {
                relative.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                relative.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    (depth > 0).then_some(relative)
}

/// Extract the zip archive at `archive` into `dest`.
///
/// Returns the number of files written.
pub fn extract(archive: &Path, dest: &Path) -> RegistryResult<usize> {
    let file = File::open(archive).map_err(RegistryError::io(archive))?;
    let mut zip = ZipArchive::new(file).map_err(|source| RegistryError::Archive {
        path: archive.to_path_buf(),
        source,
    })?;

    fs::create_dir_all(dest).map_err(RegistryError::io(dest))?;

    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|source| RegistryError::Archive {
            path: archive.to_path_buf(),
            source,
        })?;

        let name = entry.name().to_string();
        let relative = confine(&name).ok_or_else(|| RegistryError::IllegalPath {
            entry: name.clone(),
            root: dest.to_path_buf(),
        })?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(RegistryError::io(&out_path))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(RegistryError::io(parent))?;
        }

        let mut out_file = File::create(&out_path).map_err(RegistryError::io(&out_path))?;
        io::copy(&mut entry, &mut out_file).map_err(RegistryError::io(&out_path))?;
        written += 1;
    }

    tracing::debug!(archive = %archive.display(), files = written, "archive extracted");
    Ok(written)
}
