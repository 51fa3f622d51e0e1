//! Start-rate throttle.
//!
//! At most one caller passes [`RateLimiter::acquire`] per interval. The lock is
//! held only for the timestamp check; waiting happens outside it, and the check
//! is retried after every wait since another caller may have taken the slot.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, sleep};

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until a start is permitted, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = self.try_claim(Instant::now());
            match wait {
                None => return,
                Some(remaining) => {
                    tracing::debug!(wait_ms = remaining.as_millis() as u64, "rate limited");
                    sleep(remaining).await;
                }
            }
        }
    }

    /// Claim the slot if the interval has elapsed, otherwise return the remaining wait.
    fn try_claim(&self, now: Instant) -> Option<Duration> {
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(prev) if now.saturating_duration_since(prev) < self.interval => {
                Some(self.interval - now.saturating_duration_since(prev))
            }
            _ => {
                *last = Some(now);
                None
            }
        }
    }
}
