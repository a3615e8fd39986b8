//! Burst coalescing between the event fan-in and the cycle consumer.

use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};

use kubegen_core::{ChangeEvent, WaitBounds};

/// Which deadline flushed a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Min,
    Max,
    /// The event stream closed with a burst still pending.
    Closed,
}

/// Pending burst: the newest event plus its two deadlines.
///
/// The min deadline re-arms on every event; the max deadline is anchored to
/// the first event of the burst and never moves.
#[derive(Debug, Clone, Default)]
pub struct DebounceWindow {
    latest: Option<ChangeEvent>,
    min_deadline: Option<Instant>,
    max_deadline: Option<Instant>,
}

impl DebounceWindow {
    pub fn observe(&mut self, event: ChangeEvent, now: Instant, bounds: &WaitBounds) {
        self.latest = Some(event);
        self.min_deadline = Some(now + bounds.min);
        if self.max_deadline.is_none() {
            self.max_deadline = bounds.max_deadline().map(|max| now + max);
        }
    }

    pub fn min_deadline(&self) -> Option<Instant> {
        self.min_deadline
    }

    pub fn max_deadline(&self) -> Option<Instant> {
        self.max_deadline
    }

    pub fn is_pending(&self) -> bool {
        self.latest.is_some()
    }

    /// Clear both deadlines and hand back the newest event.
    pub fn flush(&mut self, expiry: Expiry) -> Option<ChangeEvent> {
        match expiry {
            Expiry::Min => tracing::debug!("min wait reached"),
            Expiry::Max => tracing::debug!("max wait reached"),
            Expiry::Closed => tracing::debug!("event stream closed, flushing pending event"),
        }
        self.min_deadline = None;
        self.max_deadline = None;
        self.latest.take()
    }
}

/// Forward events from `events` to `triggers`, coalescing bursts per
/// `bounds`. A zero min wait forwards every event as it arrives.
///
/// Returns when shutdown is broadcast, when `events` closes, or when the
/// trigger consumer goes away. Shutdown discards a pending burst; a closed
/// event stream flushes it first.
pub async fn run_debouncer(
    mut events: mpsc::Receiver<ChangeEvent>,
    triggers: mpsc::Sender<ChangeEvent>,
    bounds: WaitBounds,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    if bounds.is_bypassed() {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if triggers.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }
        return;
    }

    let mut window = DebounceWindow::default();
    loop {
        let min = window.min_deadline();
        let max = window.max_deadline();

        // Deadlines are polled before new events so a steady stream cannot
        // starve the max wait.
        let flushed = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = sleep_until(max.unwrap_or_else(Instant::now)), if max.is_some() => {
                window.flush(Expiry::Max)
            }
            _ = sleep_until(min.unwrap_or_else(Instant::now)), if min.is_some() => {
                window.flush(Expiry::Min)
            }
            event = events.recv() => match event {
                Some(event) => {
                    window.observe(event, Instant::now(), &bounds);
                    None
                }
                None => {
                    if window.is_pending() {
                        if let Some(event) = window.flush(Expiry::Closed) {
                            let _ = triggers.send(event).await;
                        }
                    }
                    break;
                }
            },
        };

        if let Some(event) = flushed {
            if triggers.send(event).await.is_err() {
                break;
            }
        }
    }
}
