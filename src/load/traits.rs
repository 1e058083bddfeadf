//! Load system types and host interfaces
//!
//! Defines the resolution states, the error type reported through the host
//! error channel, and the hook trait the embedding application implements.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Package resolution state
///
/// Monotonic within a session epoch: `Unresolved -> Fetching -> Provided`.
/// Only `Resolver::clear` returns a session's view to `Unresolved`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    /// Not requested, or requested but not yet handed to the fetcher
    #[default]
    Unresolved,
    /// Owning file has been handed to the fetcher
    Fetching,
    /// Owning file has been fetched; the package is usable by dependents
    Provided,
}

/// A package that could not be batched, and the dependency holding it back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedPackage {
    /// The blocked package
    pub package: String,
    /// First unresolved Hard dependency found for it
    pub blocked_by: String,
}

impl fmt::Display for BlockedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} blocked by {}", self.package, self.blocked_by)
    }
}

fn format_blocked(blocked: &[BlockedPackage]) -> String {
    blocked
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load system errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Package {package} depends on {dependency}, which is not available")]
    UnknownPackage { package: String, dependency: String },

    #[error("Package {0} requested but not found")]
    UnknownRequest(String),

    #[error("Package {package} cannot be provided: dependency {dependency} failed")]
    DependencyFailed { package: String, dependency: String },

    #[error("Dependency problem, no package can make progress: {}", format_blocked(.blocked))]
    ResolutionDeadlock { blocked: Vec<BlockedPackage> },

    #[error("Invalid manifest: {0}")]
    ManifestParse(String),

    #[error("Failed to read manifest: {0}")]
    ManifestIo(String),

    #[error("Unsupported manifest version: {0}")]
    UnsupportedManifestVersion(u32),

    #[error("Invalid dependency token: {0:?}")]
    InvalidToken(String),

    #[error("Registry lock poisoned")]
    RegistryPoisoned,
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::ManifestParse(e.to_string())
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::ManifestIo(e.to_string())
    }
}

/// Result of an import request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatus {
    /// Already provided; the ready callback ran synchronously with this canonical name
    Ready(String),
    /// Queued; the ready callback runs once the owning file has been fetched
    Pending,
    /// Rejected; the reason went out through `LoadHooks::on_error`
    Failed,
}

impl ImportStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ImportStatus::Ready(_))
    }
}

/// A file handed to the host for fetching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// File path or URL
    pub path: String,
    /// Whether the file comes from a different origin than the application
    pub remote: bool,
    /// Packages the file provides once fetched
    pub packages: Vec<String>,
    /// Declared size in bytes (0 if unknown)
    pub size: u64,
    /// Session wave that scheduled the fetch, starting at 1
    pub wave: u64,
}

/// How the host handled a fetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file is available now; provide its packages immediately
    Complete,
    /// The host will call `Resolver::complete_fetch` when the file arrives
    Deferred,
}

/// Hooks the embedding application supplies to a resolver session
///
/// All methods are invoked synchronously from the session. `on_error` is the
/// error channel; errors are never dropped by the resolver.
pub trait LoadHooks {
    /// Fetch side effect for a file. Called exactly once per file per session.
    fn fetch_file(&mut self, _request: &FetchRequest) -> FetchOutcome {
        FetchOutcome::Complete
    }

    /// A package reached `Provided`
    fn on_provide(&mut self, _package: &str) {}

    /// A file finished fetching and all of its packages are provided
    fn on_file_provide(&mut self, _path: &str, _remote: bool) {}

    /// Resolution error for a package or for the session
    fn on_error(&mut self, error: LoadError);
}
