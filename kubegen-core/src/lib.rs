//! kubegen core library: domain types, configuration, resource sources,
//! snapshot loading, and platform operations.
//!
//! - [`types`]: [`ResourceKind`], [`Resource`], [`Snapshot`], [`ChangeEvent`]
//! - [`config`]: [`GeneratorConfig`], [`WaitBounds`], duration parsing
//! - [`source`]: the [`ResourceSource`] capability and shipped adapters
//! - [`snapshot`]: [`load_snapshot`]
//! - [`platform`]: [`PlatformOps`]
//! - [`environment`]: [`Environment`]
//! - [`error`]: [`ConfigError`], [`SourceError`], [`SnapshotError`]

pub mod config;
pub mod environment;
pub mod error;
pub mod platform;
pub mod snapshot;
pub mod source;
pub mod types;

pub use config::{GeneratorConfig, TemplateSource, WaitBounds};
pub use environment::Environment;
pub use error::{ConfigError, SnapshotError, SourceError};
pub use platform::{CommandOutput, PlatformOps, PortablePlatform, PosixPlatform};
pub use snapshot::load_snapshot;
pub use source::{ResourceSource, WatchPoll, WatchStream};
pub use types::{ChangeEvent, ChangeKind, KindSelection, Resource, ResourceKind, Snapshot};
