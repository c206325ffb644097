//! Bounded fixed-delay reconnection policy.
//!
//! The policy itself is pure: given how many consecutive failures a channel
//! has seen, [`ReconnectPolicy::on_failure`] says whether to retry and when.
//! Scheduling lives in [`RetryTimer`], a cancellable handle the registry keeps
//! on the channel entry so that `disconnect` can cancel a pending retry.

use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;

/// Default number of consecutive failures after which a channel gives up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default pause before each retry.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// What to do after a channel failed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`; this will be attempt number `attempt`.
    Retry { attempt: u32, delay: Duration },
    /// Ceiling reached after `attempts` failures.
    GiveUp { attempts: u32 },
}

/// Retry ceiling plus a constant delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Decide after a failure, given the attempt count *after* incrementing.
    pub fn on_failure(&self, attempts: u32) -> RetryDecision {
        if attempts >= self.max_attempts {
            RetryDecision::GiveUp { attempts }
        } else {
            RetryDecision::Retry {
                attempt: attempts,
                delay: self.delay,
            }
        }
    }
}

/// A scheduled retry that can be cancelled.
///
/// Dropping an armed timer cancels it, so a channel entry that is removed
/// can never fire a stale retry. The task that a timer fires must
/// [`disarm`](RetryTimer::disarm) it before releasing it, otherwise the drop
/// would abort the task that is running.
#[derive(Debug)]
pub struct RetryTimer {
    handle: Option<AbortHandle>,
}

impl RetryTimer {
    /// Run `task` after `delay` on the current tokio runtime.
    pub fn schedule<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self {
            handle: Some(join.abort_handle()),
        }
    }

    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Release the timer without touching its task.
    pub fn disarm(mut self) {
        self.handle = None;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(AbortHandle::is_finished)
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
