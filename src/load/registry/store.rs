//! Package registry
//!
//! Process-wide record of which file provides which packages and what each
//! package requires. Populated by manifest ingestion and shared, behind a
//! lock, by every resolver session.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

use crate::load::registry::dependencies::DependencyToken;
use crate::load::traits::ResolutionState;

/// Registry handle shared between sessions and manifest loaders
pub type SharedRegistry = Arc<RwLock<Registry>>;

/// A named package bound to exactly one owning file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name (unique key)
    pub name: String,
    /// File that provides this package
    pub file: String,
    /// Process-wide state: `Fetching` once any session requests `file`, `Provided` once it arrives
    #[serde(default)]
    pub state: ResolutionState,
    /// Declared dependencies, in declaration order
    pub dependencies: Vec<DependencyToken>,
    /// Declared size of the owning file in bytes
    pub size: u64,
    /// Number of packages provided by the declaration that bound this package
    pub declared_with: usize,
}

impl PackageInfo {
    /// Ordering key for competing declarations; larger wins.
    fn declaration_key(&self) -> (usize, u64, Reverse<&str>) {
        (self.declared_with, self.size, Reverse(self.file.as_str()))
    }
}

/// A fetchable file and the packages it supplies atomically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File path or URL
    pub path: String,
    /// Packages this file provides
    pub provided: BTreeSet<String>,
    /// Union of its packages' dependencies (informational)
    pub required: BTreeSet<DependencyToken>,
    /// Declared size in bytes
    pub size: u64,
    /// Set once any session has fetched the file
    pub fetched: bool,
    /// Whether the file lives on a different origin than the application
    pub remote: bool,
}

/// Package and file registry
#[derive(Debug, Default)]
pub struct Registry {
    packages: BTreeMap<String, PackageInfo>,
    files: BTreeMap<String, FileInfo>,
    /// Package name -> declaring file -> that file's latest declaration
    candidates: BTreeMap<String, BTreeMap<String, PackageInfo>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty registry wrapped for sharing
    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Declare that `file` provides `provided`, each requiring `required`.
    ///
    /// Every file's latest declaration of a package competes for the binding;
    /// the winner ranks highest by `(provided count, size, reverse path)`.
    /// That order is total over distinct files, so the bindings depend only on
    /// each file's latest declaration and not on how calls interleave. A
    /// binding that has left `Unresolved` is pinned. The file entry is always
    /// rewritten.
    pub fn add_dependency(
        &mut self,
        file: &str,
        provided: &[String],
        required: &[DependencyToken],
        size: u64,
    ) {
        let provided_set: BTreeSet<String> = provided.iter().cloned().collect();
        let candidate_count = provided_set.len();

        let mut affected = provided_set.clone();
        if let Some(previous) = self.files.get(file) {
            for name in previous.provided.difference(&provided_set) {
                if let Some(decls) = self.candidates.get_mut(name) {
                    decls.remove(file);
                    if decls.is_empty() {
                        self.candidates.remove(name);
                    }
                }
                affected.insert(name.clone());
            }
        }

        for name in &provided_set {
            let candidate = PackageInfo {
                name: name.clone(),
                file: file.to_string(),
                state: ResolutionState::Unresolved,
                dependencies: required.to_vec(),
                size,
                declared_with: candidate_count,
            };
            self.candidates
                .entry(name.clone())
                .or_default()
                .insert(file.to_string(), candidate);
        }

        for name in &affected {
            self.rebind(name);
        }

        let fetched = self.files.get(file).map(|f| f.fetched).unwrap_or(false);
        self.files.insert(
            file.to_string(),
            FileInfo {
                path: file.to_string(),
                provided: provided_set,
                required: required.iter().cloned().collect(),
                size,
                fetched,
                remote: has_scheme(file),
            },
        );
    }

    /// Bind `name` to its best-ranked declaration unless already pinned
    fn rebind(&mut self, name: &str) {
        if let Some(existing) = self.packages.get(name) {
            if existing.state != ResolutionState::Unresolved {
                debug!("Keeping pinned binding of {} to {}", name, existing.file);
                return;
            }
        }

        let best = self.candidates.get(name).and_then(|decls| {
            decls
                .values()
                .max_by(|a, b| a.declaration_key().cmp(&b.declaration_key()))
                .cloned()
        });
        match best {
            Some(info) => {
                trace!("Binding package {} to {}", name, info.file);
                self.packages.insert(name.to_string(), info);
            }
            None => {
                debug!("No file declares {} any more", name);
                self.packages.remove(name);
            }
        }
    }

    /// Look up a package by name
    pub fn package(&self, name: &str) -> Option<&PackageInfo> {
        self.packages.get(name)
    }

    /// Look up a file by path
    pub fn file(&self, path: &str) -> Option<&FileInfo> {
        self.files.get(path)
    }

    pub fn contains_package(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// All known package names, sorted
    pub fn package_names(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    /// All known files, sorted by path
    pub fn files(&self) -> impl Iterator<Item = &FileInfo> {
        self.files.values()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.files.is_empty()
    }

    /// Record that some session handed `path` to its fetcher.
    ///
    /// Packages bound to the file become `Fetching` process-wide, which pins
    /// their binding against later competing declarations.
    pub(crate) fn mark_fetching(&mut self, path: &str) {
        for info in self.packages.values_mut().filter(|p| p.file == path) {
            if info.state == ResolutionState::Unresolved {
                info.state = ResolutionState::Fetching;
            }
        }
    }

    /// Record that `path` arrived; its bound packages become `Provided`
    pub(crate) fn mark_provided(&mut self, path: &str) {
        if let Some(file) = self.files.get_mut(path) {
            file.fetched = true;
        }
        for info in self.packages.values_mut().filter(|p| p.file == path) {
            info.state = ResolutionState::Provided;
        }
    }
}

/// Whether `path` carries a URL scheme (`http:`, `https:`, `data:`, ...).
///
/// Single-letter prefixes are drive letters, not schemes.
pub fn has_scheme(path: &str) -> bool {
    match path.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
