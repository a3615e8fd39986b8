use std::fmt::Write as _;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use kubegen_core::ChangeEvent;
use kubegen_sync::{CycleError, CycleReport, Generator};

use crate::debounce::run_debouncer;
use crate::error::{io_err, join_err, DaemonError};
use crate::watcher::{spawn_watcher, WatchSettings, WatcherHandle};

const EVENT_BUFFER: usize = 100;

/// Control surface for a running [`Lifecycle`].
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    events: mpsc::Sender<ChangeEvent>,
    shutdown: broadcast::Sender<()>,
}

impl LifecycleHandle {
    /// Queue one extra regeneration, like SIGHUP. Returns false when the
    /// event could not be queued.
    pub fn reload(&self) -> bool {
        self.events.try_send(ChangeEvent::ReloadSignal).is_ok()
    }

    /// Stop every background task, like SIGTERM.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

/// Drives one generator in one-shot or continuous mode.
#[derive(Debug)]
pub struct Lifecycle {
    generator: Generator,
    watch_settings: WatchSettings,
    events_tx: mpsc::Sender<ChangeEvent>,
    events_rx: mpsc::Receiver<ChangeEvent>,
    shutdown_tx: broadcast::Sender<()>,
    // Subscribed up front so a shutdown requested before `run` is not lost.
    shutdown_rx: broadcast::Receiver<()>,
}

impl Lifecycle {
    pub fn new(generator: Generator) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(16);
        Self {
            generator,
            watch_settings: WatchSettings::default(),
            events_tx,
            events_rx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn with_watch_settings(mut self, settings: WatchSettings) -> Self {
        self.watch_settings = settings;
        self
    }

    pub fn handle(&self) -> LifecycleHandle {
        LifecycleHandle {
            events: self.events_tx.clone(),
            shutdown: self.shutdown_tx.clone(),
        }
    }

    /// Run to completion: one cycle in one-shot mode, or until shutdown in
    /// watch mode.
    pub async fn run(self) -> Result<(), DaemonError> {
        self.generator.config().validate()?;
        if self.generator.config().watch {
            self.run_continuous().await
        } else {
            let report = run_cycle(&self.generator).await??;
            log_report("one-shot", &report);
            Ok(())
        }
    }

    async fn run_continuous(self) -> Result<(), DaemonError> {
        let Lifecycle {
            generator,
            watch_settings,
            events_tx,
            events_rx,
            shutdown_tx,
            mut shutdown_rx,
        } = self;
        let config = generator.config().clone();

        match run_cycle(&generator).await? {
            Ok(report) => log_report("initial", &report),
            Err(err) => tracing::error!(error = %err, "initial cycle failed"),
        }

        let watchers: Vec<WatcherHandle> = config
            .kinds
            .kinds()
            .iter()
            .map(|&kind| {
                spawn_watcher(
                    kind,
                    std::sync::Arc::clone(generator.source()),
                    events_tx.clone(),
                    watch_settings,
                )
            })
            .collect();

        let (trigger_tx, trigger_rx) = mpsc::channel::<ChangeEvent>(EVENT_BUFFER);

        let debouncer_handle = {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            let wait = config.wait;
            tokio::spawn(async move {
                run_debouncer(events_rx, trigger_tx, wait, shutdown_rx).await;
                let _ = shutdown.send(());
                Ok::<(), DaemonError>(())
            })
        };

        let consumer_handle = {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            let generator = generator.clone();
            tokio::spawn(async move {
                let result = cycle_consumer(generator, trigger_rx, shutdown_rx).await;
                let _ = shutdown.send(());
                result
            })
        };

        let ticker_handle = config.interval.filter(|i| !i.is_zero()).map(|period| {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            let events = events_tx.clone();
            tokio::spawn(async move {
                ticker_task(period, events, shutdown_rx).await;
                let _ = shutdown.send(());
                Ok::<(), DaemonError>(())
            })
        });

        let signal_handle = {
            let shutdown = shutdown_tx.clone();
            let shutdown_rx = shutdown.subscribe();
            let events = events_tx.clone();
            tokio::spawn(async move {
                let result = signal_task(events, shutdown_rx).await;
                let _ = shutdown.send(());
                result
            })
        };
        drop(events_tx);

        tracing::info!(
            kinds = %config.kinds,
            wait = %config.wait,
            interval_s = config.interval.map(|i| i.as_secs()),
            "watching for changes"
        );

        let _ = shutdown_rx.recv().await;
        // Re-broadcast for tasks that subscribed after an early request.
        let _ = shutdown_tx.send(());
        tracing::info!("shutting down");

        for watcher in watchers {
            watcher.stop().await?;
        }
        handle_join("debouncer", debouncer_handle.await)?;
        handle_join("cycle_consumer", consumer_handle.await)?;
        if let Some(ticker) = ticker_handle {
            handle_join("ticker", ticker.await)?;
        }
        handle_join("signal_handler", signal_handle.await)?;
        Ok(())
    }
}

/// Start the runtime and block the current thread until it exits.
pub fn start_blocking(generator: Generator) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(Lifecycle::new(generator).run())
}

/// Install the global subscriber. `quiet` turns logging off entirely.
pub fn init_tracing(quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_cycle(generator: &Generator) -> Result<Result<CycleReport, CycleError>, DaemonError> {
    let generator = generator.clone();
    tokio::task::spawn_blocking(move || generator.run_cycle())
        .await
        .map_err(|e| join_err("cycle", e))
}

async fn cycle_consumer(
    generator: Generator,
    mut triggers: mpsc::Receiver<ChangeEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        // Shutdown wins over queued triggers; an in-flight cycle still finishes.
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            trigger = triggers.recv() => {
                let Some(trigger) = trigger else { break };
                tracing::debug!(%trigger, "regenerating");
                match run_cycle(&generator).await? {
                    Ok(report) => log_report(&trigger.to_string(), &report),
                    Err(err) => tracing::error!(%trigger, error = %err, "cycle failed"),
                }
            }
        }
    }
    Ok(())
}

async fn ticker_task(
    period: Duration,
    events: mpsc::Sender<ChangeEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                if events.send(ChangeEvent::TimerTick).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Route a signal-derived event: reloads join the event stream, shutdown
/// ends the task (whose exit broadcasts shutdown).
async fn dispatch_signal(
    event: ChangeEvent,
    name: &str,
    events: &mpsc::Sender<ChangeEvent>,
) -> bool {
    tracing::info!(signal = name, %event, "received signal");
    match event {
        ChangeEvent::ReloadSignal => events.send(event).await.is_ok(),
        _ => false,
    }
}

#[cfg(unix)]
async fn signal_task(
    events: mpsc::Sender<ChangeEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).map_err(DaemonError::Signal)?;
    let mut interrupt = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;
    let mut quit = signal(SignalKind::quit()).map_err(DaemonError::Signal)?;
    let mut terminate = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;

    loop {
        let keep_going = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => false,
            _ = terminate.recv() => dispatch_signal(ChangeEvent::ShutdownSignal, "SIGTERM", &events).await,
            _ = interrupt.recv() => dispatch_signal(ChangeEvent::ShutdownSignal, "SIGINT", &events).await,
            _ = quit.recv() => dispatch_signal(ChangeEvent::ShutdownSignal, "SIGQUIT", &events).await,
            _ = hangup.recv() => dispatch_signal(ChangeEvent::ReloadSignal, "SIGHUP", &events).await,
        };
        if !keep_going {
            return Ok(());
        }
    }
}

#[cfg(not(unix))]
async fn signal_task(
    events: mpsc::Sender<ChangeEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    tokio::select! {
        biased;
        _ = shutdown_rx.recv() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(DaemonError::Signal)?;
            dispatch_signal(ChangeEvent::ShutdownSignal, "ctrl-c", &events).await;
            Ok(())
        }
    }
}

fn log_report(trigger: &str, report: &CycleReport) {
    let mut kinds = String::new();
    for (kind, count) in &report.counts {
        if !kinds.is_empty() {
            kinds.push(',');
        }
        let _ = write!(kinds, "{kind}={count}");
    }
    tracing::info!(
        trigger,
        kinds = %kinds,
        total = report.total(),
        write = report.write.label(),
        duration_ms = report.duration.as_millis() as u64,
        "cycle complete"
    );
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(join_err(task, err)),
    }
}
