//! Manifest ingestion from disk

use script_loader::{load_manifest, LoadError, Manifest, ManifestLoader, Registry};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

mod common;
use common::*;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_paths_resolve_against_manifest_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "game/deps.json",
        r#"{
            "version": 1,
            "packages": [
                ["lib/a.js", ["a"], [], 100],
                ["/static/b.js", ["b"], ["a"], 200],
                ["https://cdn.example.com/c.js", ["c"], [], 300]
            ]
        }"#,
    );

    let registry = Registry::shared();
    let manifest = load_manifest(&registry, &path).unwrap();
    assert_eq!(manifest.packages.len(), 3);

    let expected_a = temp_dir
        .path()
        .join("game")
        .join("lib/a.js")
        .to_string_lossy()
        .into_owned();
    let registry_guard = registry.read().unwrap();
    assert_eq!(registry_guard.package("a").unwrap().file, expected_a);
    assert_eq!(registry_guard.package("b").unwrap().file, "/static/b.js");
    assert_eq!(
        registry_guard.package("c").unwrap().file,
        "https://cdn.example.com/c.js"
    );
    assert!(registry_guard.file("https://cdn.example.com/c.js").unwrap().remote);
    assert_eq!(registry_guard.package("b").unwrap().size, 200);
}

#[test]
fn test_legacy_manifest_is_normalized() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "deps.json",
        r#"[["a.js", ["a"], []], ["b.js", ["b", "b2"], ["a", ">opt", "@shim.js"]]]"#,
    );

    let registry = Registry::shared();
    let manifest = ManifestLoader::new(registry.clone()).load(&path).unwrap();

    assert_eq!(manifest.version, 1);
    assert!(manifest.packages.iter().all(|entry| entry.size == 0));
    assert_eq!(manifest.packages[1].dependencies, tokens(&["a", ">opt", "@shim.js"]));
    assert_eq!(registry.read().unwrap().package_count(), 3);

    let normalized = Manifest::parse(&manifest.to_json(false).unwrap()).unwrap();
    assert_eq!(normalized, manifest);
}

#[test]
fn test_malformed_manifest_leaves_registry_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let good = write(temp_dir.path(), "good.json", r#"{"version":1,"packages":[["a.js",["a"],[],1]]}"#);
    let truncated = write(temp_dir.path(), "truncated.json", r#"{"version":1,"packages":[["b.js",["b"],"#);
    let bad_entry = write(
        temp_dir.path(),
        "bad_entry.json",
        r#"{"version":1,"packages":[["c.js",["c"],[],1],["d.js",["d"],["@"],1]]}"#,
    );

    let registry = Registry::shared();
    let loader = ManifestLoader::new(registry.clone());
    loader.load(&good).unwrap();

    assert!(matches!(loader.load(&truncated), Err(LoadError::ManifestParse(_))));
    assert!(matches!(loader.load(&bad_entry), Err(LoadError::ManifestParse(_))));

    let registry_guard = registry.read().unwrap();
    assert_eq!(registry_guard.package_count(), 1);
    assert!(!registry_guard.contains_package("c"));
}

#[test]
fn test_missing_manifest_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let registry = Registry::shared();
    let result = load_manifest(&registry, temp_dir.path().join("absent.json"));
    assert!(matches!(result, Err(LoadError::ManifestIo(_))));
}

#[test]
fn test_newer_manifest_version_rejected() {
    let registry = Registry::shared();
    let result = ManifestLoader::new(registry.clone())
        .load_str(r#"{"version":2,"packages":[]}"#, Path::new(""));
    assert_eq!(result.unwrap_err(), LoadError::UnsupportedManifestVersion(2));
    assert!(registry.read().unwrap().is_empty());
}

#[test]
fn test_competing_manifests_bind_independent_of_order() {
    let small = r#"{"version":1,"packages":[["small.js",["x"],[],10]]}"#;
    let large = r#"{"version":1,"packages":[["large.js",["x","y"],[],10]]}"#;

    let forward = Registry::shared();
    let loader = ManifestLoader::new(forward.clone());
    loader.load_str(small, Path::new("")).unwrap();
    loader.load_str(large, Path::new("")).unwrap();

    let backward = Registry::shared();
    let loader = ManifestLoader::new(backward.clone());
    loader.load_str(large, Path::new("")).unwrap();
    loader.load_str(small, Path::new("")).unwrap();

    assert_eq!(forward.read().unwrap().package("x").unwrap().file, "large.js");
    assert_eq!(backward.read().unwrap().package("x").unwrap().file, "large.js");
}

#[test]
fn test_loaded_manifest_drives_resolution() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "deps.json",
        r#"{"version":1,"packages":[["core.js",["core"],[],0],["ui.js",["ui"],["core"],0]],"generator":"tools"}"#,
    );

    let registry = Registry::shared();
    let manifest = load_manifest(&registry, &path).unwrap();
    assert_eq!(manifest.extra["generator"], "tools");

    let (mut session, log) = session(&registry);
    session.import_package("ui", None);

    let fetched = log.borrow().fetched.clone();
    assert_eq!(fetched.len(), 2);
    assert!(fetched[0].ends_with("core.js"));
    assert!(fetched[1].ends_with("ui.js"));
    assert!(session.is_imported("ui"));
}
