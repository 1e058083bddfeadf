//! Property-based tests for resolution order and registry merging
//!
//! Uses proptest over random acyclic dependency graphs.

use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

mod common;
use common::*;

/// Random acyclic graph: package `i` may only require packages below `i`.
/// The second vector assigns each package to one of a few files.
fn graph() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (1usize..12).prop_flat_map(|n| {
        let deps: Vec<_> = (0..n)
            .map(|i| prop::collection::vec(0..i.max(1), 0..=i.min(3)))
            .collect();
        (deps, prop::collection::vec(0usize..4, n))
    })
}

fn names(indices: &[usize]) -> Vec<String> {
    indices.iter().map(|j| format!("p{}", j)).collect()
}

fn as_strs(names: &[String]) -> Vec<&str> {
    names.iter().map(|s| s.as_str()).collect()
}

/// Property: with one file per package, every dependency is provided before its dependent
proptest! {
    #[test]
    fn prop_dependencies_provided_first(
        (deps, _) in graph(),
        root_pick in any::<prop::sample::Index>(),
    ) {
        let registry = new_registry();
        for (i, required) in deps.iter().enumerate() {
            let name = format!("p{}", i);
            let required = names(required);
            declare(&registry, &format!("f{}.js", i), &[name.as_str()], &as_strs(&required), 0);
        }

        let root = format!("p{}", root_pick.index(deps.len()));
        let (mut session, log) = session(&registry);
        session.import_package(&root, None);

        let log = log.borrow();
        prop_assert!(log.errors.is_empty());
        prop_assert!(session.is_imported(&root));
        prop_assert!(!session.is_batching());

        let unique: HashSet<_> = log.fetched.iter().collect();
        prop_assert_eq!(unique.len(), log.fetched.len());

        for name in &log.provided {
            prop_assert_eq!(log.provided.iter().filter(|p| *p == name).count(), 1);
        }
        for (i, required) in deps.iter().enumerate() {
            let name = format!("p{}", i);
            if !log.provided.contains(&name) {
                continue;
            }
            for dep in names(required) {
                prop_assert!(position(&log.provided, &dep) < position(&log.provided, &name));
            }
        }
    }
}

/// Property: importing everything provides each package once, file by file
proptest! {
    #[test]
    fn prop_import_all_provides_files_atomically((deps, mut files) in graph()) {
        // Files ordered like packages, so file-level requirements stay acyclic
        files.sort_unstable();
        let registry = new_registry();
        let mut by_file: Vec<Vec<usize>> = vec![Vec::new(); 4];
        for (i, file) in files.iter().enumerate() {
            by_file[*file].push(i);
        }
        for (file, members) in by_file.iter().enumerate() {
            if members.is_empty() {
                continue;
            }
            let provided = names(members);
            let required: Vec<String> = members
                .iter()
                .flat_map(|i| names(&deps[*i]))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            declare(&registry, &format!("f{}.js", file), &as_strs(&provided), &as_strs(&required), 0);
        }

        let (mut session, log) = session(&registry);
        prop_assert_eq!(session.import_all(), deps.len());

        let log = log.borrow();
        prop_assert!(log.errors.is_empty());
        prop_assert_eq!(log.provided.len(), deps.len());

        let unique: HashSet<_> = log.fetched.iter().collect();
        prop_assert_eq!(unique.len(), log.fetched.len());

        // A file's packages are announced back to back
        for members in by_file.iter().filter(|m| !m.is_empty()) {
            let mut positions: Vec<usize> =
                names(members).iter().map(|p| position(&log.provided, p)).collect();
            positions.sort_unstable();
            prop_assert_eq!(positions[positions.len() - 1] - positions[0], positions.len() - 1);
        }
    }
}

/// Property: registry bindings do not depend on how files' declarations interleave.
/// A file may declare more than once; only its own order is kept fixed.
proptest! {
    #[test]
    fn prop_bindings_independent_of_order(
        declarations in prop::collection::vec(
            (0usize..3, prop::collection::btree_set(0usize..6, 0..4), 0u64..3),
            1..10,
        )
    ) {
        let declare_all = |order: &[usize]| {
            let registry = new_registry();
            for &i in order {
                let (file, provided, size) = &declarations[i];
                let provided: Vec<String> = provided.iter().map(|p| format!("p{}", p)).collect();
                declare(&registry, &format!("f{}.js", file), &as_strs(&provided), &[], *size);
            }
            let guard = registry.read().unwrap();
            let bindings: Vec<(String, String)> = guard
                .package_names()
                .into_iter()
                .map(|name| {
                    let file = guard.package(&name).unwrap().file.clone();
                    (name, file)
                })
                .collect();
            bindings
        };

        let interleaved: Vec<usize> = (0..declarations.len()).collect();
        // Stable sorts keep each file's declarations in their original order
        let mut grouped = interleaved.clone();
        grouped.sort_by_key(|&i| declarations[i].0);
        let mut grouped_reversed = interleaved.clone();
        grouped_reversed.sort_by_key(|&i| std::cmp::Reverse(declarations[i].0));

        let expected = declare_all(&interleaved);
        prop_assert_eq!(&expected, &declare_all(&grouped));
        prop_assert_eq!(&expected, &declare_all(&grouped_reversed));
    }
}
