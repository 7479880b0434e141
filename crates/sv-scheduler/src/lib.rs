//! Periodic Sampling Scheduler (C3).
//!
//! Drives each configured alert's sampling task at its own poll interval,
//! with jitter so pollers sharing a signal endpoint don't wake in lockstep.
//!
//! ```no_run
//! use std::time::Duration;
//! use sv_scheduler::Scheduler;
//!
//! # async fn example() {
//! let scheduler = Scheduler::new();
//! let _handle = scheduler.schedule("server_load_1m", Duration::from_secs(60), || async {
//!     Ok(())
//! });
//! scheduler.shutdown().await;
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Uniform jitter bounds in seconds: `[0.001, 60.0]`, resampled every
/// iteration. Breaks up synchronized waves of pollers across alerts that
/// share a signal endpoint.
const JITTER_MIN_SECS: f64 = 0.001;
const JITTER_MAX_SECS: f64 = 60.0;

/// A handle to one scheduled task. Dropping it does not cancel the task —
/// use [`Scheduler::shutdown`] to cancel every outstanding handle.
pub struct TaskHandle {
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Waits for the task to finish (only happens after shutdown).
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

/// Repeatedly runs scheduled tasks, one spawned tokio task per scheduled
/// job, on a cooperative event loop. There is no global start barrier:
/// each call to [`schedule`](Scheduler::schedule) starts its task
/// immediately.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Schedules `task` to run repeatedly with spacing approximately
    /// `interval` seconds between starts. Each iteration: sleep for a
    /// fresh random jitter, run the task, then sleep for
    /// `interval - jitter` (clamped to zero if jitter exceeds interval).
    ///
    /// Task failure is caught, logged, and does not cancel subsequent
    /// iterations. Cancellation is cooperative: an in-flight task always
    /// completes its current iteration before the loop exits.
    pub fn schedule<F, Fut>(&self, name: impl Into<String>, interval: Duration, task: F) -> TaskHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        let name = name.into();
        let mut shutdown_rx = self.shutdown_rx.clone();

        let join = tokio::spawn(async move {
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                let jitter = sample_jitter();
                if sleep_or_cancel(jitter, &mut shutdown_rx).await {
                    break;
                }

                if let Err(err) = task().await {
                    warn!(task = %name, error = %err, "scheduled task failed, continuing on schedule");
                } else {
                    debug!(task = %name, "scheduled task completed");
                }

                let remaining = interval.saturating_sub(jitter);
                if !remaining.is_zero() && sleep_or_cancel(remaining, &mut shutdown_rx).await {
                    break;
                }
            }
            debug!(task = %name, "scheduled task loop exited");
        });

        TaskHandle { join }
    }

    /// Cancels all outstanding handles. In-flight tasks are allowed to
    /// complete their current iteration; this only waits for loops to
    /// notice the shutdown flag at their next check point.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn sample_jitter() -> Duration {
    let secs = rand::thread_rng().gen_range(JITTER_MIN_SECS..=JITTER_MAX_SECS);
    Duration::from_secs_f64(secs)
}

/// Sleeps for `duration`, returning early (with `true`) if shutdown fires
/// first. Returns `false` if the sleep completed normally.
async fn sleep_or_cancel(duration: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown_rx.changed() => true,
    }
}
