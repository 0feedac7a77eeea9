//! Fixed-interval driver for background work.
//!
//! A [`PeriodicTaskRunner`] runs one [`PeriodicTask`] on a timer with a
//! bounded initial delay. At most one run is in flight at a time: a tick that
//! fires while the previous run is still going is dropped, not queued.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::SchedulerError;

/// Ceiling on the delay before the first run.
pub const MAX_INITIAL_DELAY_SECS: u64 = 60;

/// Work driven by a [`PeriodicTaskRunner`].
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Called once, before the initial delay.
    async fn init_task(&self, _interval: Duration) {}

    /// One run. Errors are the task's own business: log them and return.
    async fn run_task(&self);
}

pub struct PeriodicTaskRunner {
    task: Arc<dyn PeriodicTask>,
    interval: Duration,
    initial_delay: Duration,
    /// Single-slot execution token.
    running: Arc<Mutex<()>>,
    skipped_ticks: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl PeriodicTaskRunner {
    /// Fails with [`SchedulerError::InvalidInterval`] unless `interval_secs > 0`.
    pub fn new(task: Arc<dyn PeriodicTask>, interval_secs: i64) -> Result<Self, SchedulerError> {
        if interval_secs <= 0 {
            return Err(SchedulerError::InvalidInterval(interval_secs));
        }
        let interval = Duration::from_secs(interval_secs as u64);
        let initial_delay = interval.min(Duration::from_secs(MAX_INITIAL_DELAY_SECS));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            task,
            interval,
            initial_delay,
            running: Arc::new(Mutex::new(())),
            skipped_ticks: AtomicU64::new(0),
            shutdown,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Ticks dropped because a run was still in progress.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Start the timer loop. The returned handle finishes after [`shutdown`](Self::shutdown).
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let name = runner.task.name().to_string();
            info!(
                task = %name,
                interval_secs = runner.interval.as_secs(),
                initial_delay_secs = runner.initial_delay.as_secs(),
                "Starting periodic task"
            );

            runner.task.init_task(runner.interval).await;

            if *shutdown_rx.borrow() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(runner.initial_delay) => {}
                _ = shutdown_rx.changed() => {
                    info!(task = %name, "Periodic task stopped before first run");
                    return;
                }
            }

            let mut ticker = tokio::time::interval(runner.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        runner.try_run_now();
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            info!(task = %name, "Periodic task stopped");
        })
    }

    /// Spawn a run unless one is already in progress. Returns whether a run
    /// was started.
    ///
    /// The token is released when the run finishes, including by panic, so a
    /// failed run never blocks the next tick.
    pub fn try_run_now(&self) -> bool {
        match Arc::clone(&self.running).try_lock_owned() {
            Ok(guard) => {
                let task = Arc::clone(&self.task);
                tokio::spawn(async move {
                    let _guard = guard;
                    debug!(task = task.name(), "Periodic run started");
                    task.run_task().await;
                });
                true
            }
            Err(_) => {
                self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
                warn!(task = self.task.name(), "Previous run still in progress, skipping");
                false
            }
        }
    }

    /// Run `f` on its own task while holding the execution token and return
    /// its output, or `None` without calling `f` if a run is already in
    /// progress.
    ///
    /// The token is owned by the spawned task: dropping the returned future
    /// detaches the run but keeps the token held until it finishes.
    pub async fn run_exclusive<F, Fut, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let guard = Arc::clone(&self.running).try_lock_owned().ok()?;
        let run = tokio::spawn(async move {
            let _guard = guard;
            f().await
        });

        match run.await {
            Ok(output) => Some(output),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!(task = self.task.name(), error = %e, "Exclusive run cancelled");
                None
            }
        }
    }

    /// Stop the timer loop. A run already in flight is left to finish.
    pub fn shutdown(&self) {
        info!(task = self.task.name(), "Periodic task shutdown requested");
        self.shutdown.send_replace(true);
    }
}
