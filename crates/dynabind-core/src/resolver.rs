//! Search-path resolution.
//!
//! Directories are consulted strictly in order and the first existing file
//! wins. Two directories holding the same library therefore always resolve
//! to the earlier one.

use std::path::{Path, PathBuf};

use crate::error::{BindError, Result};
use crate::platform::{library_extension, library_prefix};

/// File names that may hold `library` on this platform, in the order tried.
pub fn candidate_file_names(library: &str) -> Vec<String> {
    let ext = library_extension();
    let mut names = Vec::with_capacity(3);

    if Path::new(library).extension().and_then(|e| e.to_str()) == Some(ext) {
        names.push(library.to_string());
    }

    let plain = format!("{}.{}", library, ext);
    if !names.contains(&plain) {
        names.push(plain);
    }

    let prefixed = format!("{}{}.{}", library_prefix(), library, ext);
    if !names.contains(&prefixed) {
        names.push(prefixed);
    }

    names
}

/// Find the first file in `search_paths` that holds `library`.
pub fn resolve(library: &str, search_paths: &[PathBuf]) -> Result<PathBuf> {
    let candidates = candidate_file_names(library);

    for dir in search_paths {
        for name in &candidates {
            let path = dir.join(name);
            if path.is_file() {
                tracing::debug!(category = "native", library, path = %path.display(), "Resolved library path");
                return Ok(path);
            }
        }
    }

    Err(BindError::LibraryNotFound {
        library: library.to_string(),
        searched: search_paths.to_vec(),
    })
}
