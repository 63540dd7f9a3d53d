//! Discovery of metadata documents under a directory.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// File suffix for metadata documents.
const META_SUFFIX: &str = ".meta.yml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Root-relative path without the `.meta.yml` suffix, `/`-joined.
    pub logical_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("metadata directory does not exist: {0}")]
    MissingDir(String),

    #[error("failed to read metadata directory {0}: {1}")]
    WalkError(String, #[source] walkdir::Error),
}

/// Find every `*.meta.yml` file under `root`.
///
/// The listing is sorted by logical name so repeated scans are deterministic.
pub fn discover_documents(root: &Path) -> Result<Vec<DocumentInfo>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::MissingDir(root.display().to_string()));
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry
            .map_err(|e| DiscoveryError::WalkError(root.display().to_string(), e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_metadata_file(path) {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        documents.push(DocumentInfo {
            logical_name: logical_name_from_relative(rel),
            path: path.to_path_buf(),
        });
    }

    documents.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));
    Ok(documents)
}

fn is_metadata_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(META_SUFFIX))
}

fn logical_name_from_relative(rel: &Path) -> String {
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    joined.strip_suffix(META_SUFFIX).unwrap_or(&joined).to_string()
}
