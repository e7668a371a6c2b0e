//! Time tracking helpers
//!
//! [`track_time_interval`] runs an async action every `interval` on a
//! dedicated task. The action is awaited inside the loop, so two runs of the
//! same action never overlap; ticks missed while an action is still running
//! are skipped rather than queued.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Smallest period accepted; tokio rejects a zero period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// First firing for periods too long to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Handle on a running interval. Dropping it cancels the interval.
#[derive(Debug)]
pub struct IntervalListener {
    task: JoinHandle<()>,
    cancelled: AtomicBool,
    interval: Duration,
}

impl IntervalListener {
    /// Stop further firings.
    ///
    /// Returns `true` for the call that actually cancelled; later calls are
    /// no-ops returning `false`.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.task.abort();
        debug!(interval = ?self.interval, "Cancelled interval listener");
        true
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for IntervalListener {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Call `action` with the current UTC time every `interval`.
///
/// The first call happens one full interval after this function returns.
/// Must be called from within a tokio runtime.
pub fn track_time_interval<F, Fut>(interval: Duration, action: F) -> IntervalListener
where
    F: Fn(DateTime<Utc>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let interval = interval.max(MIN_INTERVAL);

    let task = tokio::spawn(async move {
        let now = Instant::now();
        let start = now
            .checked_add(interval)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut ticker = time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let now = Utc::now();
            trace!(%now, "Interval fired");
            action(now).await;
        }
    });

    IntervalListener {
        task,
        cancelled: AtomicBool::new(false),
        interval,
    }
}
