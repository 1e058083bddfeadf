//! Batching engine
//!
//! Each wave scans the pending list once, moves every entry whose Hard
//! dependencies are satisfied into the current batch, and fetches the files
//! the batch implicates. Waves repeat until nothing is pending, a deferred
//! fetch is outstanding, or no entry can make progress.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace};

use super::{InFlight, PendingEntry, Resolver};
use crate::load::registry::{DependencyToken, Registry};
use crate::load::traits::{BlockedPackage, FetchOutcome, FetchRequest, LoadError, ResolutionState};
use crate::utils::{with_read_lock, with_write_lock};

/// Outcome of checking one pending package
enum Eligibility {
    /// Can join the current batch
    Ready,
    /// Already fetching or provided; drop from pending
    Settled,
    /// Waiting on a Hard dependency
    Blocked,
    /// Excluded for the rest of the session
    Failed(LoadError),
}

/// A file to fetch in the current wave
struct FetchPlan {
    path: String,
    remote: bool,
    packages: Vec<String>,
    size: u64,
}

/// Packages `path` declares that are still bound to it
fn bound_packages(registry: &Registry, path: &str) -> Vec<String> {
    registry
        .file(path)
        .map(|f| {
            f.provided
                .iter()
                .filter(|name| registry.package(name).map(|p| p.file == path).unwrap_or(false))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Provides a fetch owes; a raw file with no packages still counts once
fn fetch_weight(packages: &[String]) -> usize {
    packages.len().max(1)
}

fn session_state(states: &HashMap<String, ResolutionState>, name: &str) -> ResolutionState {
    states.get(name).copied().unwrap_or_default()
}

impl Resolver {
    /// Add `root` and everything it transitively requires to the pending list.
    ///
    /// Walks an explicit stack. Entries already pending, already settled, or
    /// failed are skipped along with their subtrees. Unknown Hard targets are
    /// left for the batch scan to report against their dependent.
    pub(super) fn enqueue_closure(&mut self, root: DependencyToken) -> Result<(), LoadError> {
        let states = &self.states;
        let failed = &self.failed;
        let fetched_files = &self.fetched_files;
        let pending_index = &self.pending_index;

        let added = with_read_lock(&self.registry, |registry| {
            let mut added = Vec::new();
            let mut seen = HashSet::new();
            let mut stack = vec![root];

            while let Some(token) = stack.pop() {
                let entry = match &token {
                    DependencyToken::RawFile(path) => {
                        if fetched_files.contains(path) {
                            continue;
                        }
                        PendingEntry::File(path.clone())
                    }
                    DependencyToken::Hard(name) | DependencyToken::Weak(name) => {
                        if !registry.contains_package(name) {
                            trace!("{} required but not found", name);
                            continue;
                        }
                        if session_state(states, name) != ResolutionState::Unresolved
                            || failed.contains_key(name)
                        {
                            continue;
                        }
                        PendingEntry::Package(name.clone())
                    }
                };

                if pending_index.contains(&entry) || !seen.insert(entry.clone()) {
                    continue;
                }

                if let PendingEntry::Package(name) = &entry {
                    if let Some(info) = registry.package(name) {
                        stack.extend(info.dependencies.iter().rev().cloned());
                    }
                }
                added.push(entry);
            }
            added
        })?;

        trace!("Queued {} entries", added.len());
        self.push_pending(added);
        Ok(())
    }

    /// Schedule waves until done, blocked, or waiting on a deferred fetch
    pub(super) fn run_waves(&mut self) {
        if self.running {
            return;
        }
        self.running = true;

        loop {
            if !self.batching || self.outstanding > 0 {
                break;
            }
            if self.pending.is_empty() {
                debug!("Import session idle after {} waves", self.waves);
                self.batching = false;
                break;
            }

            let epoch = self.wave_epoch;
            let batch = match self.build_batch() {
                Ok(batch) => batch,
                Err(e) => {
                    self.batching = false;
                    self.report(e);
                    break;
                }
            };
            if batch.is_empty() {
                continue;
            }

            self.waves += 1;
            debug!("Wave {}: {} entries", self.waves, batch.len());
            self.current_batch = batch;
            if let Err(e) = self.provision_batch(epoch) {
                self.batching = false;
                self.report(e);
                break;
            }
        }

        self.running = false;
    }

    /// Scan the pending list into a fresh batch.
    ///
    /// Returns an empty batch when the pending list emptied without anything
    /// to fetch, or when it deadlocked (reported, and batching halted).
    fn build_batch(&mut self) -> Result<Vec<PendingEntry>, LoadError> {
        loop {
            let pending = std::mem::take(&mut self.pending);
            let mut batch = Vec::new();
            let mut remaining = Vec::new();
            let mut failures = Vec::new();

            with_read_lock(&self.registry, |registry| {
                for entry in pending {
                    let name = match &entry {
                        PendingEntry::File(_) => None,
                        PendingEntry::Package(name) => Some(name.clone()),
                    };
                    let Some(name) = name else {
                        batch.push(entry);
                        continue;
                    };
                    match self.eligibility(registry, &name) {
                        Eligibility::Ready => batch.push(entry),
                        Eligibility::Settled => {}
                        Eligibility::Blocked => remaining.push(entry),
                        Eligibility::Failed(err) => failures.push((name, err)),
                    }
                }
            })?;

            self.pending_index = remaining.iter().cloned().collect();
            self.pending = remaining;

            let progressed = !failures.is_empty();
            for (name, err) in failures {
                self.fail(name, err);
            }

            if !batch.is_empty() || self.pending.is_empty() {
                return Ok(batch);
            }
            if progressed {
                // Dependents of the packages that just failed fail on the next pass
                continue;
            }

            let blocked = with_read_lock(&self.registry, |registry| self.diagnose_blocked(registry))?;
            info!("Dependency problem: {} packages blocked", blocked.len());
            let error = LoadError::ResolutionDeadlock { blocked };
            for entry in std::mem::take(&mut self.pending) {
                if let PendingEntry::Package(name) = entry {
                    self.readies.remove(&name);
                    self.failed.insert(name, error.clone());
                }
            }
            self.pending_index.clear();
            self.batching = false;
            self.report(error);
            return Ok(Vec::new());
        }
    }

    fn eligibility(&self, registry: &Registry, name: &str) -> Eligibility {
        if session_state(&self.states, name) != ResolutionState::Unresolved {
            return Eligibility::Settled;
        }
        let Some(info) = registry.package(name) else {
            return Eligibility::Failed(LoadError::UnknownRequest(name.to_string()));
        };

        for dep in &info.dependencies {
            let DependencyToken::Hard(dep_name) = dep else {
                continue;
            };

            match registry.package(dep_name) {
                None if self.tolerate_unknown => {
                    trace!("Ignoring unknown dependency {} of {}", dep_name, name);
                }
                None => {
                    return Eligibility::Failed(LoadError::UnknownPackage {
                        package: name.to_string(),
                        dependency: dep_name.clone(),
                    });
                }
                Some(dep_info) => {
                    if dep_info.file == info.file
                        || session_state(&self.states, dep_name) == ResolutionState::Provided
                    {
                        continue;
                    }
                    if self.failed.contains_key(dep_name) {
                        return Eligibility::Failed(LoadError::DependencyFailed {
                            package: name.to_string(),
                            dependency: dep_name.clone(),
                        });
                    }
                    return Eligibility::Blocked;
                }
            }
        }
        Eligibility::Ready
    }

    /// Name the first unsatisfied Hard dependency of every pending package
    fn diagnose_blocked(&self, registry: &Registry) -> Vec<BlockedPackage> {
        let mut blocked = Vec::new();
        for entry in &self.pending {
            let PendingEntry::Package(name) = entry else {
                continue;
            };
            let Some(info) = registry.package(name) else {
                continue;
            };
            let blocker = info.dependencies.iter().find_map(|dep| {
                let dep_name = match dep {
                    DependencyToken::Hard(dep_name) => dep_name,
                    _ => return None,
                };
                let same_file = registry
                    .package(dep_name)
                    .map(|d| d.file == info.file)
                    .unwrap_or(false);
                let provided = session_state(&self.states, dep_name) == ResolutionState::Provided;
                (!same_file && !provided).then(|| dep_name.clone())
            });
            if let Some(blocked_by) = blocker {
                debug!("{} blocked by {}", name, blocked_by);
                blocked.push(BlockedPackage {
                    package: name.clone(),
                    blocked_by,
                });
            }
        }
        blocked
    }

    /// Fetch every file the current batch implicates, once per file per session
    fn provision_batch(&mut self, epoch: u64) -> Result<(), LoadError> {
        let plans = self.plan_fetches()?;

        for plan in plans {
            if self.wave_epoch != epoch {
                debug!("Session aborted mid-wave; not fetching {}", plan.path);
                break;
            }

            let packages: Vec<String> = plan
                .packages
                .into_iter()
                .filter(|p| session_state(&self.states, p) == ResolutionState::Unresolved)
                .collect();
            let announce = !(self.skip_bootstrap && packages.contains(&self.bootstrap_package));

            if self.fetched_files.contains(&plan.path) {
                // The file already ran in this session; later declarations for it are live
                self.outstanding += fetch_weight(&packages);
                self.in_flight.insert(
                    plan.path.clone(),
                    InFlight { packages, remote: plan.remote, announce: false },
                );
                self.finish_file(&plan.path);
                continue;
            }

            for package in &packages {
                self.states.insert(package.clone(), ResolutionState::Fetching);
            }
            self.outstanding += fetch_weight(&packages);
            self.fetched_files.insert(plan.path.clone());
            with_write_lock(&self.registry, |r| r.mark_fetching(&plan.path))?;
            self.current = Some(plan.path.clone());

            let request = FetchRequest {
                path: plan.path.clone(),
                remote: plan.remote,
                packages: packages.clone(),
                size: plan.size,
                wave: self.waves,
            };
            self.in_flight.insert(
                plan.path.clone(),
                InFlight { packages, remote: plan.remote, announce },
            );

            let outcome = if announce {
                info!("Now importing {}", plan.path);
                self.hooks.fetch_file(&request)
            } else {
                trace!("Skipping fetch of bootstrap file {}", plan.path);
                FetchOutcome::Complete
            };
            match outcome {
                FetchOutcome::Complete => {
                    self.finish_file(&plan.path);
                }
                FetchOutcome::Deferred => trace!("Fetch of {} deferred", plan.path),
            }
        }

        self.current_batch.clear();
        Ok(())
    }

    /// Resolve the current batch into distinct files, in batch order
    fn plan_fetches(&self) -> Result<Vec<FetchPlan>, LoadError> {
        with_read_lock(&self.registry, |registry| {
            let mut seen = HashSet::new();
            let mut plans = Vec::new();

            for entry in &self.current_batch {
                let plan = match entry {
                    PendingEntry::File(path) => {
                        let file = registry.file(path);
                        FetchPlan {
                            path: path.clone(),
                            remote: true,
                            packages: bound_packages(registry, path),
                            size: file.map(|f| f.size).unwrap_or(0),
                        }
                    }
                    PendingEntry::Package(name) => {
                        let Some(info) = registry.package(name) else {
                            continue;
                        };
                        let file = registry.file(&info.file);
                        let mut packages = bound_packages(registry, &info.file);
                        if !packages.contains(name) {
                            packages.push(name.clone());
                        }
                        FetchPlan {
                            path: info.file.clone(),
                            remote: file.map(|f| f.remote).unwrap_or(false),
                            packages,
                            size: info.size,
                        }
                    }
                };
                if seen.insert(plan.path.clone()) {
                    plans.push(plan);
                }
            }
            plans
        })
    }

    /// Provide every package of an in-flight file in one sweep, then notify.
    ///
    /// Returns `false` if `path` was not in flight.
    pub(super) fn finish_file(&mut self, path: &str) -> bool {
        let Some(flight) = self.in_flight.remove(path) else {
            return false;
        };
        if let Err(e) = with_write_lock(&self.registry, |r| r.mark_provided(path)) {
            self.report(e);
        }

        for package in &flight.packages {
            self.states.insert(package.clone(), ResolutionState::Provided);
            self.failed.remove(package);
        }
        self.outstanding = self.outstanding.saturating_sub(fetch_weight(&flight.packages));

        let session = self.session_epoch;
        for package in &flight.packages {
            if let Some(callbacks) = self.readies.remove(package) {
                for callback in callbacks {
                    callback(self, package);
                    if self.session_epoch != session {
                        return true;
                    }
                }
            }
            if !(self.skip_bootstrap && *package == self.bootstrap_package) {
                self.hooks.on_provide(package);
            }
        }

        if let Some(callbacks) = self.file_readies.remove(path) {
            for callback in callbacks {
                callback(self, path);
                if self.session_epoch != session {
                    return true;
                }
            }
        }
        if flight.announce {
            self.hooks.on_file_provide(path, flight.remote);
        }
        true
    }

    fn fail(&mut self, name: String, error: LoadError) {
        self.readies.remove(&name);
        self.failed.insert(name, error.clone());
        self.report(error);
    }
}
