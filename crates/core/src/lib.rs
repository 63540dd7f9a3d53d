#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

//! Core library for metaplate - dimensional metadata template resolution.
//!
//! Metadata documents for data-publishing pipelines describe datasets,
//! tables, and indicators in YAML, parameterized by dimensions (`age`, `sex`,
//! `cause`, ...). This crate resolves one such document against one set of
//! dimension bindings into fully concrete, dimension-free metadata:
//!
//! ```
//! use metaplate_core::{DimensionBindings, MetadataDocument, resolve};
//!
//! let document = MetadataDocument::from_yaml_str(
//!     "tables:\n  deaths:\n    variables:\n      v:\n        title: Deaths from <<cause.lower()>>\n",
//! )
//! .unwrap();
//! let bindings = DimensionBindings::from_pairs([("cause", "Malaria")]);
//!
//! let resolved = resolve(&document, &bindings).unwrap();
//! assert_eq!(
//!     resolved.get("tables.deaths.variables.v.title").unwrap().as_str(),
//!     Some("Deaths from malaria")
//! );
//! ```

pub mod bindings;
pub mod document;
pub mod error;
pub mod merge;
pub mod resolver;
pub mod template;

pub use bindings::{BindingError, DimensionBindings};
pub use document::{
    DiscoveryError, DocumentError, DocumentInfo, FieldPath, LoaderError,
    MetadataDocument, ResolvedDocument, discover_documents, load_document,
};
pub use error::ResolveError;
pub use resolver::{Resolver, ResolverOptions, resolve};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
