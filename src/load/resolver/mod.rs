//! Resolver sessions
//!
//! A [`Resolver`] is one independent import request stream. It turns
//! requested packages into waves of file fetches against a shared
//! [`Registry`](crate::load::registry::Registry), and reports progress to the
//! embedding application through [`LoadHooks`].
//!
//! Delivery guarantees:
//! - every package of a file becomes `Provided` in the same sweep, before any
//!   callback for that file runs;
//! - ready callbacks run once per registration, in registration order;
//! - imports issued from inside a callback are queued for a later wave.

mod batch;

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::load::registry::{DependencyToken, SharedRegistry};
use crate::load::traits::{ImportStatus, LoadError, LoadHooks, ResolutionState};
use crate::utils::with_read_lock;

/// Callback run once a requested package (or raw file) is available.
///
/// Receives the session, so it may issue further imports, and the canonical
/// name: the package name without sigil, or the raw file path.
pub type ReadyCallback = Box<dyn FnOnce(&mut Resolver, &str)>;

/// Wrap a closure as a ready callback
pub fn ready<F>(f: F) -> Option<ReadyCallback>
where
    F: FnOnce(&mut Resolver, &str) + 'static,
{
    Some(Box::new(f))
}

/// Worklist entry: a package to batch, or a raw file to fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PendingEntry {
    Package(String),
    File(String),
}

/// Fetch that has been handed to the host but not yet completed
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    packages: Vec<String>,
    remote: bool,
    announce: bool,
}

/// Snapshot of session progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadProgress {
    /// Entries waiting to be batched
    pub pending: usize,
    /// Provides owed by fetches that have started but not completed
    pub outstanding: usize,
    /// Declared size of files still to fetch, in KiB
    pub remaining_kib: u64,
    /// File most recently handed to the fetcher
    pub current: Option<String>,
}

/// Resolver session
pub struct Resolver {
    registry: SharedRegistry,
    hooks: Box<dyn LoadHooks>,
    tolerate_unknown: bool,
    skip_bootstrap: bool,
    bootstrap_package: String,

    /// Requested but not yet batched, in request order
    pending: Vec<PendingEntry>,
    pending_index: HashSet<PendingEntry>,
    /// Entries selected for the wave in progress
    current_batch: Vec<PendingEntry>,
    /// Session-local view of package states
    states: HashMap<String, ResolutionState>,
    fetched_files: HashSet<String>,
    in_flight: HashMap<String, InFlight>,
    /// Packages excluded for the rest of the session
    failed: HashMap<String, LoadError>,
    readies: HashMap<String, Vec<ReadyCallback>>,
    file_readies: HashMap<String, Vec<ReadyCallback>>,
    outstanding: usize,

    batching: bool,
    running: bool,
    wave_epoch: u64,
    session_epoch: u64,
    waves: u64,
    current: Option<String>,
}

impl Resolver {
    /// Create a new session over `registry`
    pub fn new(registry: SharedRegistry, config: &LoaderConfig, hooks: Box<dyn LoadHooks>) -> Self {
        Self {
            registry,
            hooks,
            tolerate_unknown: config.tolerate_unknown,
            skip_bootstrap: config.skip_bootstrap,
            bootstrap_package: config.bootstrap_package.clone(),
            pending: Vec::new(),
            pending_index: HashSet::new(),
            current_batch: Vec::new(),
            states: HashMap::new(),
            fetched_files: HashSet::new(),
            in_flight: HashMap::new(),
            failed: HashMap::new(),
            readies: HashMap::new(),
            file_readies: HashMap::new(),
            outstanding: 0,
            batching: false,
            running: false,
            wave_epoch: 0,
            session_epoch: 0,
            waves: 0,
            current: None,
        }
    }

    /// Create a session with default configuration
    pub fn with_hooks(registry: SharedRegistry, hooks: Box<dyn LoadHooks>) -> Self {
        Self::new(registry, &LoaderConfig::default(), hooks)
    }

    /// Request a package (`name`, `>name`) or raw file (`@path`).
    ///
    /// If the target is already available, `on_ready` runs before this
    /// returns and the canonical name is returned. Otherwise the request and
    /// its transitive dependencies are queued, batching starts if idle, and
    /// `on_ready` runs once the owning file has been fetched.
    pub fn import_package(&mut self, request: &str, on_ready: Option<ReadyCallback>) -> ImportStatus {
        match DependencyToken::parse(request) {
            Ok(token) => self.import_token(token, on_ready),
            Err(e) => {
                self.report(e);
                ImportStatus::Failed
            }
        }
    }

    /// Request an already-parsed dependency token
    pub fn import_token(&mut self, token: DependencyToken, on_ready: Option<ReadyCallback>) -> ImportStatus {
        let status = self.enqueue_request(token, on_ready);
        if status == ImportStatus::Pending {
            self.start_batching();
        }
        status
    }

    /// Request every package known to the registry
    pub fn import_all(&mut self) -> usize {
        self.import_match(|_| true)
    }

    /// Request every known package whose name satisfies `predicate`.
    ///
    /// All matches are queued before batching starts. Returns the number of
    /// packages matched.
    pub fn import_match<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let names = match with_read_lock(&self.registry, |r| r.package_names()) {
            Ok(names) => names,
            Err(e) => {
                self.report(e);
                return 0;
            }
        };

        let matched: Vec<String> = names.into_iter().filter(|n| predicate(n)).collect();
        debug!("Importing {} matching packages", matched.len());

        let mut queued = false;
        for name in &matched {
            if self.enqueue_request(DependencyToken::Hard(name.clone()), None) == ImportStatus::Pending {
                queued = true;
            }
        }
        if queued {
            self.start_batching();
        }
        matched.len()
    }

    /// Whether `name` has been provided in this session
    pub fn is_imported(&self, name: &str) -> bool {
        self.state(name) == ResolutionState::Provided
    }

    /// Session-local state of `name`
    pub fn state(&self, name: &str) -> ResolutionState {
        self.states.get(name).copied().unwrap_or_default()
    }

    /// Whether `name` was excluded from this session by an error
    pub fn is_failed(&self, name: &str) -> bool {
        self.failed.contains_key(name)
    }

    /// Whether waves are being scheduled
    pub fn is_batching(&self) -> bool {
        self.batching
    }

    /// Number of waves scheduled so far in this session
    pub fn waves(&self) -> u64 {
        self.waves
    }

    /// Stop scheduling fetches.
    ///
    /// Pending requests are dropped. Packages already provided stay provided,
    /// and fetches already handed to the host still complete.
    pub fn abort(&mut self) {
        debug!("Aborting import session ({} pending)", self.pending.len());
        self.batching = false;
        self.pending.clear();
        self.pending_index.clear();
        self.current_batch.clear();
        self.wave_epoch += 1;
    }

    /// Forget all resolution state, as if nothing had been requested
    pub fn clear(&mut self) {
        self.abort();
        self.states.clear();
        self.fetched_files.clear();
        self.in_flight.clear();
        self.failed.clear();
        self.readies.clear();
        self.file_readies.clear();
        self.outstanding = 0;
        self.current = None;
        self.session_epoch += 1;
    }

    /// Report that a deferred fetch of `path` has finished.
    ///
    /// Provides the file's packages and resumes batching once no fetches
    /// remain outstanding. Returns `false` if `path` was not awaiting
    /// completion.
    pub fn complete_fetch(&mut self, path: &str) -> bool {
        // Imports issued by callbacks below wait for the next wave
        let was_running = std::mem::replace(&mut self.running, true);
        let finished = self.finish_file(path);
        self.running = was_running;

        if !finished {
            debug!("Ignoring completion for {}; not in flight", path);
            return false;
        }
        if !self.running && self.batching && self.outstanding == 0 {
            self.run_waves();
        }
        true
    }

    /// Current progress snapshot
    pub fn progress(&self) -> LoadProgress {
        let remaining_bytes = with_read_lock(&self.registry, |registry| {
            let mut seen = HashSet::new();
            let mut sum = 0u64;
            for entry in &self.pending {
                let (path, size) = match entry {
                    PendingEntry::Package(name) => match registry.package(name) {
                        Some(info) => (info.file.as_str(), info.size),
                        None => continue,
                    },
                    PendingEntry::File(path) => (
                        path.as_str(),
                        registry.file(path).map(|f| f.size).unwrap_or(0),
                    ),
                };
                if seen.insert(path) {
                    sum = sum.saturating_add(size);
                }
            }
            sum
        })
        .unwrap_or(0);

        LoadProgress {
            pending: self.pending.len(),
            outstanding: self.outstanding,
            remaining_kib: remaining_bytes / 1024,
            current: self.current.clone(),
        }
    }

    fn enqueue_request(&mut self, token: DependencyToken, on_ready: Option<ReadyCallback>) -> ImportStatus {
        match token {
            DependencyToken::RawFile(path) => {
                if self.fetched_files.contains(&path) && !self.in_flight.contains_key(&path) {
                    if let Some(callback) = on_ready {
                        callback(self, &path);
                    }
                    return ImportStatus::Ready(path);
                }
                if let Some(callback) = on_ready {
                    self.file_readies.entry(path.clone()).or_default().push(callback);
                }
                if !self.in_flight.contains_key(&path) {
                    self.push_pending(vec![PendingEntry::File(path)]);
                }
                ImportStatus::Pending
            }
            DependencyToken::Hard(name) | DependencyToken::Weak(name) => {
                if self.is_imported(&name) {
                    if let Some(callback) = on_ready {
                        callback(self, &name);
                    }
                    return ImportStatus::Ready(name);
                }

                if let Some(err) = self.failed.get(&name).cloned() {
                    warn!("Package {} was excluded from this session", name);
                    self.report(err);
                    return ImportStatus::Failed;
                }

                match with_read_lock(&self.registry, |r| r.contains_package(&name)) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.report(LoadError::UnknownRequest(name));
                        return ImportStatus::Failed;
                    }
                    Err(e) => {
                        self.report(e);
                        return ImportStatus::Failed;
                    }
                }

                if let Some(callback) = on_ready {
                    self.readies.entry(name.clone()).or_default().push(callback);
                }
                if let Err(e) = self.enqueue_closure(DependencyToken::Hard(name)) {
                    self.report(e);
                    return ImportStatus::Failed;
                }
                ImportStatus::Pending
            }
        }
    }

    fn start_batching(&mut self) {
        self.batching = true;
        self.run_waves();
    }

    fn push_pending(&mut self, entries: Vec<PendingEntry>) {
        for entry in entries {
            if self.pending_index.insert(entry.clone()) {
                self.pending.push(entry);
            }
        }
    }

    fn report(&mut self, error: LoadError) {
        warn!("{}", error);
        self.hooks.on_error(error);
    }
}
