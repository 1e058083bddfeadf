#![allow(dead_code)]

use script_loader::{
    ready, DependencyToken, FetchOutcome, FetchRequest, LoadError, LoadHooks, LoaderConfig,
    ReadyCallback, Registry, Resolver, SharedRegistry,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Everything a session told its host
#[derive(Debug, Default)]
pub struct HostLog {
    pub fetched: Vec<String>,
    pub requests: Vec<FetchRequest>,
    pub provided: Vec<String>,
    pub files: Vec<(String, bool)>,
    pub errors: Vec<LoadError>,
    /// Deferred fetches not yet completed, oldest first
    pub awaiting: Vec<String>,
}

pub type SharedLog = Rc<RefCell<HostLog>>;

/// Hooks that record into a `HostLog`
pub struct RecordingHooks {
    log: SharedLog,
    deferred: bool,
}

impl LoadHooks for RecordingHooks {
    fn fetch_file(&mut self, request: &FetchRequest) -> FetchOutcome {
        let mut log = self.log.borrow_mut();
        log.fetched.push(request.path.clone());
        log.requests.push(request.clone());
        if self.deferred {
            log.awaiting.push(request.path.clone());
            FetchOutcome::Deferred
        } else {
            FetchOutcome::Complete
        }
    }

    fn on_provide(&mut self, package: &str) {
        self.log.borrow_mut().provided.push(package.to_string());
    }

    fn on_file_provide(&mut self, path: &str, remote: bool) {
        self.log.borrow_mut().files.push((path.to_string(), remote));
    }

    fn on_error(&mut self, error: LoadError) {
        self.log.borrow_mut().errors.push(error);
    }
}

/// Declare `file` in `registry`
pub fn declare(registry: &SharedRegistry, file: &str, provided: &[&str], required: &[&str], size: u64) {
    let provided: Vec<String> = provided.iter().map(|s| s.to_string()).collect();
    registry
        .write()
        .unwrap()
        .add_dependency(file, &provided, &tokens(required), size);
}

pub fn tokens(raw: &[&str]) -> Vec<DependencyToken> {
    raw.iter().map(|s| DependencyToken::parse(s).unwrap()).collect()
}

pub fn new_registry() -> SharedRegistry {
    Registry::shared()
}

/// Session with immediate fetches
pub fn session(registry: &SharedRegistry) -> (Resolver, SharedLog) {
    session_with(registry, &LoaderConfig::default(), false)
}

/// Session whose fetches wait for `complete_fetch`
pub fn deferred_session(registry: &SharedRegistry) -> (Resolver, SharedLog) {
    session_with(registry, &LoaderConfig::default(), true)
}

pub fn session_with(registry: &SharedRegistry, config: &LoaderConfig, deferred: bool) -> (Resolver, SharedLog) {
    let log: SharedLog = Rc::new(RefCell::new(HostLog::default()));
    let hooks = RecordingHooks {
        log: log.clone(),
        deferred,
    };
    (Resolver::new(registry.clone(), config, Box::new(hooks)), log)
}

/// Complete deferred fetches, oldest first, until none are awaited
pub fn complete_all(session: &mut Resolver, log: &SharedLog) {
    loop {
        let next = {
            let mut log = log.borrow_mut();
            if log.awaiting.is_empty() {
                None
            } else {
                Some(log.awaiting.remove(0))
            }
        };
        match next {
            Some(path) => assert!(session.complete_fetch(&path), "{} was not in flight", path),
            None => break,
        }
    }
}

pub type Calls = Rc<RefCell<Vec<String>>>;

pub fn calls() -> Calls {
    Rc::new(RefCell::new(Vec::new()))
}

/// Ready callback that records `tag:name`
pub fn record(calls: &Calls, tag: &str) -> Option<ReadyCallback> {
    let calls = calls.clone();
    let tag = tag.to_string();
    ready(move |_, name| calls.borrow_mut().push(format!("{}:{}", tag, name)))
}

pub fn position(list: &[String], item: &str) -> usize {
    list.iter()
        .position(|x| x == item)
        .unwrap_or_else(|| panic!("{} not in {:?}", item, list))
}
