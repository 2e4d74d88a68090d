//! Calibration image enumeration.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListError {
    #[error("cannot read directory {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Regular files directly under `dir` whose name ends with `ext`
/// (exact, case-sensitive suffix), sorted ascending by path.
///
/// Non-recursive; an empty result is not an error. Pass an empty `ext` to
/// list every file.
pub fn list_images(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, ListError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ListError::ReadDir {
        path: dir.display().to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ListError::ReadDir {
            path: dir.display().to_string(),
            source,
        })?;
        let file_type = entry.file_type().map_err(|source| ListError::ReadDir {
            path: entry.path().display().to_string(),
            source,
        })?;
        if !file_type.is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name();
        if name.to_string_lossy().ends_with(ext) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
