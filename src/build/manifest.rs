//! Archive manifest generation
//!
//! Manifest lines are capped at [`MAX_LINE_BYTES`] bytes. A long
//! `Class-Path` value is continued on lines that start with a single space,
//! breaking only between tokens. The separating space stays at the end of the
//! earlier line, so removing each continuation's leading space and
//! concatenating the lines gives back the exact value.

use espresso_registry::ResolvedDependency;
use thiserror::Error;

/// Maximum bytes per manifest line, excluding the line break
pub const MAX_LINE_BYTES: usize = 72;

pub const CLASS_PATH_HEADER: &str = "Class-Path";

/// Directory, relative to the archive, that dependency jars are copied into
pub const LIBS_DIR: &str = "libs";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest token '{token}' does not fit on a {limit}-byte line")]
    TokenTooLong { token: String, limit: usize },
}

/// `libs/<name>.jar` for every dependency, in declaration order.
pub fn class_path_tokens(dependencies: &[ResolvedDependency]) -> Vec<String> {
    dependencies
        .iter()
        .map(|dep| format!("{}/{}.jar", LIBS_DIR, dep.requested.name))
        .collect()
}

/// Full manifest text for a project whose entry point is `<base_package>.Main`.
///
/// No `Class-Path` header is written when `class_path` is empty.
pub fn generate(base_package: &str, class_path: &[String]) -> Result<String, ManifestError> {
    let mut lines = vec![
        "Manifest-Version: 1.0".to_string(),
        format!("Main-Class: {}.Main", base_package),
        "Created-By: Espresso".to_string(),
    ];

    if !class_path.is_empty() {
        lines.extend(wrap_header(CLASS_PATH_HEADER, class_path)?);
    }

    let mut text = lines.join("\n");
    text.push('\n');
    Ok(text)
}

/// Render `name: token token ...` as physical manifest lines.
pub fn wrap_header(name: &str, tokens: &[String]) -> Result<Vec<String>, ManifestError> {
    let mut lines = Vec::new();
    let mut current = format!("{}: ", name);

    for (i, token) in tokens.iter().enumerate() {
        let separator = if i + 1 < tokens.len() { " " } else { "" };
        let piece = token.len() + separator.len();

        if current.len() + piece > MAX_LINE_BYTES {
            if 1 + piece > MAX_LINE_BYTES {
                return Err(ManifestError::TokenTooLong {
                    token: token.clone(),
                    limit: MAX_LINE_BYTES,
                });
            }
            lines.push(std::mem::replace(&mut current, " ".to_string()));
        }

        current.push_str(token);
        current.push_str(separator);
    }

    lines.push(current);
    Ok(lines)
}

/// Join physical lines back into one logical header line.
pub fn unwrap_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut logical = String::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if i == 0 {
            logical.push_str(line);
        } else {
            logical.push_str(line.strip_prefix(' ').unwrap_or(line));
        }
    }
    logical
}
