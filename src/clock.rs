//! Local byo-yomi clock.
//!
//! [`advance`] is the pure per-tick transition; [`ClockDriver`] calls back
//! once per tick on a tokio interval. The local value is only an
//! approximation between server snapshots: the game reducer overwrites it
//! whenever a snapshot carries timers.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::protocol::TimerSnapshot;

/// Default tick cadence.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Default byo-yomi seconds restored when a period is consumed.
pub const DEFAULT_PERIOD_LENGTH: u32 = 30;

/// Clock settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub tick: Duration,
    pub period_length: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            period_length: DEFAULT_PERIOD_LENGTH,
        }
    }
}

impl ClockConfig {
    /// Interval between local countdown steps.
    ///
    /// Default: 1 second.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Byo-yomi seconds restored when a period is consumed. Used until a
    /// server snapshot states its own period length.
    ///
    /// Default: 30 seconds.
    #[must_use]
    pub fn with_period_length(mut self, seconds: u32) -> Self {
        self.period_length = seconds;
        self
    }
}

/// One second off `timer`.
///
/// Main time runs first, then byo-yomi. When byo-yomi reaches zero and a
/// period is left, the period is consumed and byo-yomi restarts at
/// `period_length`. A timer with no main time and no byo-yomi but periods
/// left enters its next period the same way. An exhausted timer stays
/// exhausted.
///
/// ```
/// use goban_sync::clock::advance;
/// use goban_sync::protocol::TimerSnapshot;
///
/// let t = advance(&TimerSnapshot::new(0, 1, 2), 30);
/// assert_eq!(t, TimerSnapshot::new(0, 30, 1));
/// ```
pub fn advance(timer: &TimerSnapshot, period_length: u32) -> TimerSnapshot {
    let mut next = *timer;
    if next.main_time > 0 {
        next.main_time -= 1;
    } else if next.byo_yomi > 0 {
        next.byo_yomi -= 1;
        if next.byo_yomi == 0 && next.periods > 0 {
            next.periods -= 1;
            next.byo_yomi = period_length;
        }
    } else if next.periods > 0 {
        // Main time just ran out and the snapshot carried no byo-yomi yet.
        next.periods -= 1;
        next.byo_yomi = period_length;
    }
    next
}

/// Background task calling `on_tick` once per tick.
///
/// The first call happens one full tick after [`start`](Self::start).
/// Stopped by [`stop`](Self::stop) or by dropping the driver.
#[derive(Debug)]
pub struct ClockDriver {
    task: Option<JoinHandle<()>>,
}

impl ClockDriver {
    pub fn start<F>(tick: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                on_tick();
            }
        });
        debug!(?tick, "clock started");
        Self { task: Some(task) }
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("clock stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
