//! Host event delivery
//!
//! Ready-made [`LoadHooks`] implementations: [`ChannelHooks`] forwards every
//! hook invocation as a [`LoadEvent`] over a tokio channel, and
//! [`LoggingHooks`] just logs.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::load::traits::{FetchOutcome, FetchRequest, LoadError, LoadHooks};

/// A hook invocation, as seen by a channel subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// A file was handed to the fetcher
    FetchRequested(FetchRequest),
    /// A package reached `Provided`
    Provided(String),
    /// A file finished and all of its packages are provided
    FileProvided { path: String, remote: bool },
    /// A resolution error
    Error(LoadError),
}

/// Forwards hook invocations over an unbounded channel
///
/// In deferred mode every fetch returns [`FetchOutcome::Deferred`]; the
/// subscriber performs the fetch and calls `Resolver::complete_fetch`.
pub struct ChannelHooks {
    sender: mpsc::UnboundedSender<LoadEvent>,
    deferred: bool,
}

impl ChannelHooks {
    /// Hooks whose fetches complete immediately
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LoadEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                deferred: false,
            },
            receiver,
        )
    }

    /// Hooks whose fetches complete when the subscriber says so
    pub fn deferred() -> (Self, mpsc::UnboundedReceiver<LoadEvent>) {
        let (mut hooks, receiver) = Self::new();
        hooks.deferred = true;
        (hooks, receiver)
    }

    fn send(&self, event: LoadEvent) {
        if let Err(mpsc::error::SendError(event)) = self.sender.send(event) {
            match event {
                LoadEvent::Error(e) => warn!("Load event subscriber gone; dropping error: {}", e),
                other => debug!("Load event subscriber gone; dropping {:?}", other),
            }
        }
    }
}

impl LoadHooks for ChannelHooks {
    fn fetch_file(&mut self, request: &FetchRequest) -> FetchOutcome {
        self.send(LoadEvent::FetchRequested(request.clone()));
        if self.deferred {
            FetchOutcome::Deferred
        } else {
            FetchOutcome::Complete
        }
    }

    fn on_provide(&mut self, package: &str) {
        self.send(LoadEvent::Provided(package.to_string()));
    }

    fn on_file_provide(&mut self, path: &str, remote: bool) {
        self.send(LoadEvent::FileProvided {
            path: path.to_string(),
            remote,
        });
    }

    fn on_error(&mut self, error: LoadError) {
        self.send(LoadEvent::Error(error));
    }
}

/// Hooks that only log; fetches complete immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl LoadHooks for LoggingHooks {
    fn on_provide(&mut self, package: &str) {
        debug!("Provided {}", package);
    }

    fn on_file_provide(&mut self, path: &str, remote: bool) {
        info!("Loaded {}{}", path, if remote { " (remote)" } else { "" });
    }

    fn on_error(&mut self, error: LoadError) {
        warn!("Load error: {}", error);
    }
}

/// Drain every event currently queued on `receiver`
pub fn drain_events(receiver: &mut mpsc::UnboundedReceiver<LoadEvent>) -> Vec<LoadEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
