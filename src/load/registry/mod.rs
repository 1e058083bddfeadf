//! Package registry and manifest ingestion
//!
//! Handles dependency token parsing, the process-wide package/file registry,
//! and loading of dependency manifests into it.

pub mod dependencies;
pub mod manifest;
pub mod store;

pub use dependencies::DependencyToken;
pub use manifest::{load_manifest, Manifest, ManifestEntry, ManifestLoader, CURRENT_MANIFEST_VERSION};
pub use store::{has_scheme, FileInfo, PackageInfo, Registry, SharedRegistry};
