//! Metadata document model, loading, and discovery.
//!
//! This module provides functionality to:
//! - Represent an unresolved metadata document as a YAML-equivalent tree
//! - Load `*.meta.yml` documents from disk
//! - Discover metadata documents under a directory

pub mod discovery;
pub mod loader;
pub mod types;

pub use discovery::{DiscoveryError, DocumentInfo, discover_documents};
pub use loader::{LoaderError, load_document};
pub use types::{DocumentError, FieldPath, MetadataDocument, ResolvedDocument};
