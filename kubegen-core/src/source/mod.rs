//! The resource source capability and its shipped adapters.
//!
//! The regeneration loop needs exactly two things from the outside world:
//! "list everything of kind K" and "tell me when anything of kind K changes".
//! [`ResourceSource`] is that seam. Both methods block, so callers in async
//! code run them on `spawn_blocking`.

use std::time::Duration;

use crate::error::SourceError;
use crate::types::{ChangeKind, Resource, ResourceKind};

pub mod api;
pub mod directory;
pub mod memory;

pub use api::ApiServerSource;
pub use directory::DirectorySource;
pub use memory::MemorySource;

/// Lists and watches resources of the supported kinds.
pub trait ResourceSource: Send + Sync {
    /// The complete current listing of `kind`.
    fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>, SourceError>;

    /// Open a change subscription for `kind`.
    fn watch(&self, kind: ResourceKind) -> Result<Box<dyn WatchStream>, SourceError>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Result of polling a [`WatchStream`] once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPoll {
    /// An object was added, modified or deleted.
    Changed(ChangeKind),
    /// Nothing happened within the poll interval.
    Idle,
    /// The subscription ended; open a new one to keep watching.
    Closed,
}

/// A live change subscription for one kind.
pub trait WatchStream: Send {
    /// Wait up to `poll` for the next change.
    ///
    /// An `Err` is a transient failure reported by the subscription; the
    /// caller logs it and keeps polling or reconnects.
    fn next_change(&mut self, poll: Duration) -> Result<WatchPoll, SourceError>;
}
