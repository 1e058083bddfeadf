//! Script package load system
//!
//! Resolves and sequences the loading of script files for a host without a
//! build-time bundler.
//!
//! ## Architecture
//!
//! - **Registry**: process-wide map of package -> owning file and file -> provided packages
//! - **Manifest Loader**: parses versioned dependency manifests into the registry
//! - **Resolver**: per-session state machine that batches requested packages into fetch waves
//! - **Hooks**: host callbacks for fetching, provide notifications and errors

pub mod events;
pub mod registry;
pub mod resolver;
pub mod traits;

pub use events::{drain_events, ChannelHooks, LoadEvent, LoggingHooks};
pub use registry::{
    load_manifest, DependencyToken, FileInfo, Manifest, ManifestEntry, ManifestLoader, PackageInfo,
    Registry, SharedRegistry,
};
pub use resolver::{ready, LoadProgress, ReadyCallback, Resolver};
pub use traits::{
    BlockedPackage, FetchOutcome, FetchRequest, ImportStatus, LoadError, LoadHooks, ResolutionState,
};
