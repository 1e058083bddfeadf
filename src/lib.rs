//! Script Loader - runtime dependency resolution for bundler-less script hosts
//!
//! Given a registry of which file provides which named packages and which
//! packages each package requires, this crate works out, at runtime, the
//! order in which files must be fetched so that requested packages become
//! usable. It tolerates diamond dependencies, packages co-declared in one
//! file, weak dependencies and partial failure.
//!
//! ## Components
//!
//! 1. Registry (`load::registry`) - package/file declarations, shared across sessions
//! 2. Manifest Loader (`load::registry::manifest`) - versioned JSON manifests into the registry
//! 3. Resolver (`load::resolver`) - per-session batching state machine
//!
//! ## Example
//!
//! ```rust,ignore
//! use script_loader::{LoggingHooks, ManifestLoader, Registry, Resolver};
//!
//! let registry = Registry::shared();
//! ManifestLoader::new(registry.clone()).load("game/deps.json")?;
//!
//! let mut session = Resolver::with_hooks(registry, Box::new(LoggingHooks));
//! session.import_package("dusk.sgui", None);
//! ```

pub mod config;
pub mod load;
pub mod utils;

pub use config::{LoaderConfig, LoggingConfig};
pub use load::{
    drain_events, load_manifest, ready, BlockedPackage, ChannelHooks, DependencyToken,
    FetchOutcome, FetchRequest, FileInfo, ImportStatus, LoadError, LoadEvent, LoadHooks,
    LoadProgress, LoggingHooks, Manifest, ManifestEntry, ManifestLoader, PackageInfo,
    ReadyCallback, Registry, ResolutionState, Resolver, SharedRegistry,
};
