//! Regeneration runtime: watcher tasks, debouncer, and the lifecycle
//! controller that runs one cycle at a time.

pub mod debounce;
mod error;
mod runtime;
pub mod watcher;

pub use debounce::{run_debouncer, DebounceWindow, Expiry};
pub use error::DaemonError;
pub use runtime::{init_tracing, start_blocking, Lifecycle, LifecycleHandle};
pub use watcher::{spawn_watcher, WatchSettings, WatcherHandle};
