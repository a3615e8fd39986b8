//! One blocking watch loop per resource kind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use kubegen_core::{ChangeEvent, ResourceKind, ResourceSource, WatchPoll};

use crate::error::{join_err, DaemonError};

/// Timing knobs for a watch loop.
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    /// How long one poll of the subscription may block; bounds how quickly
    /// the stop flag is observed.
    pub poll: Duration,
    /// Pause before re-subscribing after an error.
    pub reconnect_delay: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(250),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// A running watcher. Dropping the handle does not stop the loop; call
/// [`WatcherHandle::stop`].
#[derive(Debug)]
pub struct WatcherHandle {
    kind: ResourceKind,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Raise the stop flag and wait for the loop to exit.
    pub async fn stop(self) -> Result<(), DaemonError> {
        self.stop.store(true, Ordering::SeqCst);
        self.task.await.map_err(|e| join_err("watcher", e))?;
        tracing::debug!(kind = %self.kind, "watcher stopped");
        Ok(())
    }
}

/// Start watching `kind`, forwarding one [`ChangeEvent::KindChanged`] per
/// change into `events`.
pub fn spawn_watcher(
    kind: ResourceKind,
    source: Arc<dyn ResourceSource>,
    events: mpsc::Sender<ChangeEvent>,
    settings: WatchSettings,
) -> WatcherHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let task = {
        let stop = Arc::clone(&stop);
        tokio::task::spawn_blocking(move || watch_loop(kind, source.as_ref(), &events, &stop, settings))
    };
    WatcherHandle { kind, stop, task }
}

fn watch_loop(
    kind: ResourceKind,
    source: &dyn ResourceSource,
    events: &mpsc::Sender<ChangeEvent>,
    stop: &AtomicBool,
    settings: WatchSettings,
) {
    tracing::info!(kind = %kind, "watching");
    while !stop.load(Ordering::SeqCst) {
        let mut stream = match source.watch(kind) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "watch failed, retrying");
                pause(stop, settings.reconnect_delay);
                continue;
            }
        };

        while !stop.load(Ordering::SeqCst) {
            match stream.next_change(settings.poll) {
                Ok(WatchPoll::Changed(change)) => {
                    tracing::debug!(kind = %kind, ?change, "resource changed");
                    if events.blocking_send(ChangeEvent::KindChanged(kind)).is_err() {
                        return;
                    }
                }
                Ok(WatchPoll::Idle) => {}
                Ok(WatchPoll::Closed) => {
                    tracing::debug!(kind = %kind, "watch closed, resubscribing");
                    break;
                }
                Err(err) => {
                    tracing::warn!(kind = %kind, error = %err, "watch interrupted, retrying");
                    pause(stop, settings.reconnect_delay);
                    break;
                }
            }
        }
    }
}

/// Sleep for `delay`, waking early once `stop` is raised.
fn pause(stop: &AtomicBool, delay: Duration) {
    let step = Duration::from_millis(50);
    let deadline = Instant::now() + delay;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(step.min(deadline - now));
    }
}
