//! Client-side request budget.
//!
//! A sliding-window counter: at most `max_requests` dispatches are admitted in
//! any trailing `window`. Timestamps are pruned lazily on each check, so bursts
//! up to the limit are allowed and no smoothing is applied.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_REQUESTS: usize = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Limits applied by [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

impl RateLimitConfig {
    /// At least one dispatch per window is always allowed.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
        }
    }
}

/// Budget exhausted; `wait` is how long until the oldest slot leaves the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub wait: Duration,
}

impl RateLimitExceeded {
    /// Remaining wait rounded up to whole seconds.
    pub fn wait_secs(&self) -> u64 {
        let secs = self.wait.as_secs();
        if self.wait.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Shared sliding-window limiter. Clones observe the same window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    requests: Arc<Mutex<VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            requests: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Admit and record one dispatch, or report the wait without consuming a slot.
    pub fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        self.try_acquire_at(Instant::now())
    }

    /// Same as [`RateLimiter::try_acquire`] with an explicit clock reading.
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), RateLimitExceeded> {
        let mut requests = self.lock_requests();
        prune_window(&mut requests, now, self.config.window);

        if requests.len() >= self.config.max_requests {
            return Err(RateLimitExceeded {
                wait: wait_time(&requests, now, self.config.window),
            });
        }

        requests.push_back(now);
        Ok(())
    }

    /// Number of admitted dispatches still inside the window at `now`.
    pub fn in_window_at(&self, now: Instant) -> usize {
        let mut requests = self.lock_requests();
        prune_window(&mut requests, now, self.config.window);
        requests.len()
    }

    /// Time until the next dispatch would be admitted; zero when one is admitted now.
    pub fn wait_time_at(&self, now: Instant) -> Duration {
        let mut requests = self.lock_requests();
        prune_window(&mut requests, now, self.config.window);
        if requests.len() < self.config.max_requests {
            return Duration::ZERO;
        }
        wait_time(&requests, now, self.config.window)
    }

    fn lock_requests(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn prune_window(requests: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = requests.front() {
        if now.saturating_duration_since(*oldest) >= window {
            requests.pop_front();
        } else {
            break;
        }
    }
}

fn wait_time(requests: &VecDeque<Instant>, now: Instant, window: Duration) -> Duration {
    requests
        .front()
        .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
        .unwrap_or(Duration::ZERO)
}
