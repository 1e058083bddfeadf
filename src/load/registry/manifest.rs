//! Dependency manifest parsing and ingestion
//!
//! A manifest is JSON of the form
//! `{"version": 1, "packages": [[file, provided, dependencies, size], ...]}`.
//! Version 0 manifests are a bare array of `[file, provided, dependencies]`
//! entries and are normalized into the current shape on load. Any other
//! top-level keys are kept in [`Manifest::extra`].

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::load::registry::dependencies::DependencyToken;
use crate::load::registry::store::{has_scheme, SharedRegistry};
use crate::load::traits::LoadError;
use crate::utils::with_write_lock;

/// Manifest version produced by the current tooling
pub const CURRENT_MANIFEST_VERSION: u32 = 1;

/// One `[file, provided, dependencies, size]` manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file: String,
    pub provided: Vec<String>,
    pub dependencies: Vec<DependencyToken>,
    pub size: u64,
}

impl Serialize for ManifestEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.file)?;
        tuple.serialize_element(&self.provided)?;
        tuple.serialize_element(&self.dependencies)?;
        tuple.serialize_element(&self.size)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for ManifestEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = ManifestEntry;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array [file, provided, dependencies, size?]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ManifestEntry, A::Error> {
                let file: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let provided: Vec<String> = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let dependencies: Vec<DependencyToken> = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                // Legacy entries have no size
                let size: Option<u64> = seq.next_element()?;
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(5, &self));
                }

                Ok(ManifestEntry {
                    file,
                    provided,
                    dependencies,
                    size: size.unwrap_or(0),
                })
            }
        }

        deserializer.deserialize_seq(EntryVisitor)
    }
}

/// Parsed, normalized dependency manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest format version
    pub version: u32,
    /// File entries
    pub packages: Vec<ManifestEntry>,
    /// Additional top-level properties, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Parse manifest JSON, normalizing legacy (version 0) data
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Build a manifest from an already-decoded JSON value
    pub fn from_value(value: Value) -> Result<Self, LoadError> {
        let mut manifest = match value {
            Value::Array(_) => {
                let packages: Vec<ManifestEntry> = serde_json::from_value(value)?;
                debug!("Normalizing legacy manifest with {} entries", packages.len());
                Manifest {
                    version: 0,
                    packages,
                    extra: Map::new(),
                }
            }
            Value::Object(_) => serde_json::from_value(value)?,
            other => {
                return Err(LoadError::ManifestParse(format!(
                    "expected an object or array, found {}",
                    json_kind(&other)
                )))
            }
        };

        if manifest.version > CURRENT_MANIFEST_VERSION {
            return Err(LoadError::UnsupportedManifestVersion(manifest.version));
        }
        manifest.validate()?;
        manifest.version = CURRENT_MANIFEST_VERSION;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), LoadError> {
        for (index, entry) in self.packages.iter().enumerate() {
            if entry.file.is_empty() {
                return Err(LoadError::ManifestParse(format!(
                    "entry {} has an empty file path",
                    index
                )));
            }
            if entry.provided.iter().any(|name| name.is_empty()) {
                return Err(LoadError::ManifestParse(format!(
                    "entry {} ({}) provides an empty package name",
                    index, entry.file
                )));
            }
        }
        Ok(())
    }

    /// Resolve entry paths against `base_dir`.
    ///
    /// Absolute paths and paths carrying a URL scheme are left alone.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        for entry in &mut self.packages {
            if has_scheme(&entry.file)
                || entry.file.starts_with('/')
                || Path::new(&entry.file).is_absolute()
            {
                continue;
            }
            entry.file = base_dir.join(&entry.file).to_string_lossy().into_owned();
        }
    }

    /// Serialize in the current format
    pub fn to_json(&self, pretty: bool) -> Result<String, LoadError> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Feeds manifests into a shared registry
pub struct ManifestLoader {
    registry: SharedRegistry,
}

impl ManifestLoader {
    /// Create a loader for `registry`
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Read, parse and ingest the manifest at `path`.
    ///
    /// Entry paths are resolved against the manifest's directory. Nothing is
    /// written to the registry unless the whole manifest parses.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Manifest, LoadError> {
        let path = path.as_ref();
        info!("Loading dependency manifest {:?}", path);

        let contents = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        self.load_str(&contents, base_dir)
    }

    /// Parse and ingest manifest text as if it lived in `base_dir`
    pub fn load_str(&self, text: &str, base_dir: &Path) -> Result<Manifest, LoadError> {
        let mut manifest = Manifest::parse(text)?;
        manifest.resolve_paths(base_dir);
        self.ingest(&manifest)?;
        Ok(manifest)
    }

    /// Merge every entry of `manifest` into the registry under one lock
    pub fn ingest(&self, manifest: &Manifest) -> Result<usize, LoadError> {
        with_write_lock(&self.registry, |registry| {
            for entry in &manifest.packages {
                registry.add_dependency(
                    &entry.file,
                    &entry.provided,
                    &entry.dependencies,
                    entry.size,
                );
            }
        })?;

        debug!("Ingested {} manifest entries", manifest.packages.len());
        Ok(manifest.packages.len())
    }
}

/// Load the manifest at `path` into `registry`
pub fn load_manifest<P: AsRef<Path>>(
    registry: &SharedRegistry,
    path: P,
) -> Result<Manifest, LoadError> {
    ManifestLoader::new(registry.clone()).load(path)
}
