//! In-process source whose state is set programmatically.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use super::{ResourceSource, WatchPoll, WatchStream};
use crate::error::SourceError;
use crate::types::{ChangeKind, Resource, ResourceKind};

/// A [`ResourceSource`] backed by in-memory listings.
///
/// Changes are pushed explicitly with [`MemorySource::push`]; every open
/// subscription for that kind receives them.
#[derive(Debug, Default)]
pub struct MemorySource {
    listings: Mutex<BTreeMap<ResourceKind, Vec<Value>>>,
    subscribers: Mutex<Vec<(ResourceKind, Sender<ChangeKind>)>>,
    failing: Mutex<BTreeSet<ResourceKind>>,
    list_calls: AtomicUsize,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing of `kind`.
    pub fn set(&self, kind: ResourceKind, objects: Vec<Value>) {
        locked(&self.listings).insert(kind, objects);
    }

    /// Deliver a change to every open subscription for `kind`.
    ///
    /// Returns how many subscriptions received it.
    pub fn push(&self, kind: ResourceKind, change: ChangeKind) -> usize {
        let mut subscribers = locked(&self.subscribers);
        subscribers.retain(|(k, tx)| *k != kind || tx.send(change).is_ok());
        subscribers.iter().filter(|(k, _)| *k == kind).count()
    }

    /// End every open subscription for `kind`.
    pub fn close_watches(&self, kind: ResourceKind) {
        locked(&self.subscribers).retain(|(k, _)| *k != kind);
    }

    /// Make listing `kind` fail until cleared.
    pub fn set_failing(&self, kind: ResourceKind, failing: bool) {
        let mut set = locked(&self.failing);
        if failing {
            set.insert(kind);
        } else {
            set.remove(&kind);
        }
    }

    /// Number of `list` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of open subscriptions for `kind`.
    pub fn watchers(&self, kind: ResourceKind) -> usize {
        locked(&self.subscribers)
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl ResourceSource for MemorySource {
    fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if locked(&self.failing).contains(&kind) {
            return Err(SourceError::Http {
                url: format!("memory://{kind}"),
                message: "listing unavailable".to_string(),
            });
        }
        Ok(locked(&self.listings)
            .get(&kind)
            .map(|objects| {
                objects
                    .iter()
                    .cloned()
                    .map(|object| Resource::new(kind, object))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn watch(&self, kind: ResourceKind) -> Result<Box<dyn WatchStream>, SourceError> {
        let (tx, rx) = mpsc::channel();
        locked(&self.subscribers).push((kind, tx));
        Ok(Box::new(MemoryWatch { rx }))
    }

    fn describe(&self) -> String {
        "in-memory source".to_string()
    }
}

struct MemoryWatch {
    rx: Receiver<ChangeKind>,
}

impl WatchStream for MemoryWatch {
    fn next_change(&mut self, poll: Duration) -> Result<WatchPoll, SourceError> {
        match self.rx.recv_timeout(poll) {
            Ok(change) => Ok(WatchPoll::Changed(change)),
            Err(RecvTimeoutError::Timeout) => Ok(WatchPoll::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(WatchPoll::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn listing_reflects_latest_set() {
        let source = MemorySource::new();
        assert!(source.list(ResourceKind::Pods).expect("list").is_empty());

        source.set(ResourceKind::Pods, vec![json!({"metadata": {"name": "a"}})]);
        let pods = source.list(ResourceKind::Pods).expect("list");
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].kind, ResourceKind::Pods);
        assert_eq!(source.list_calls(), 2);
    }

    #[test]
    fn pushes_reach_only_matching_subscriptions() {
        let source = MemorySource::new();
        let mut pods = source.watch(ResourceKind::Pods).expect("watch");
        let mut services = source.watch(ResourceKind::Services).expect("watch");

        assert_eq!(source.push(ResourceKind::Pods, ChangeKind::Added), 1);
        assert_eq!(pods.next_change(POLL).expect("poll"), WatchPoll::Changed(ChangeKind::Added));
        assert_eq!(services.next_change(POLL).expect("poll"), WatchPoll::Idle);
    }

    #[test]
    fn closing_ends_the_subscription() {
        let source = MemorySource::new();
        let mut pods = source.watch(ResourceKind::Pods).expect("watch");
        source.close_watches(ResourceKind::Pods);
        assert_eq!(pods.next_change(POLL).expect("poll"), WatchPoll::Closed);
        assert_eq!(source.watchers(ResourceKind::Pods), 0);
    }

    #[test]
    fn failing_kind_errors() {
        let source = MemorySource::new();
        source.set_failing(ResourceKind::Services, true);
        assert!(source.list(ResourceKind::Services).is_err());
        source.set_failing(ResourceKind::Services, false);
        assert!(source.list(ResourceKind::Services).is_ok());
    }
}
