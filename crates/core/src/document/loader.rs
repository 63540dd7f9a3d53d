//! Loading metadata documents from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::{DocumentError, MetadataDocument};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read metadata file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse metadata file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
}

/// Load and parse a single metadata document.
///
/// YAML anchors and aliases are expanded by the parser at this stage; merge
/// keys and template syntax are left untouched for the resolver.
pub fn load_document(path: &Path) -> Result<MetadataDocument, LoaderError> {
    let source = fs::read_to_string(path)
        .map_err(|e| LoaderError::Io { path: path.to_path_buf(), source: e })?;

    let document = MetadataDocument::from_yaml_str(&source)
        .map_err(|e| LoaderError::Parse { path: path.to_path_buf(), source: e })?;

    tracing::debug!(path = %path.display(), "loaded metadata document");
    Ok(document)
}
