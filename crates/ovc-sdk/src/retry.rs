//! Retry policy shared by request submission and task polling
//!
//! Every retry loop in the client is described by a [`RetryConfig`]
//! (how the delay grows and how many attempts are allowed) and bounded by a
//! [`Deadline`] (the overall operation timeout).

use std::time::Duration;
use tokio::time::Instant;

/// Stand-in for timeouts too large to represent as an instant
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every attempt
    Fixed(Duration),
    /// `step * n` before the n-th retry
    Linear(Duration),
}

/// Retry configuration for one class of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries; `None` leaves only the deadline as bound
    pub max_attempts: Option<u32>,

    /// Delay growth between retries
    pub backoff: Backoff,
}

impl RetryConfig {
    pub fn fixed(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn linear(step: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(step),
        }
    }

    /// Start a fresh retry sequence
    pub fn start(&self) -> Retry {
        Retry {
            config: *self,
            attempts: 0,
        }
    }
}

/// Running state of one retry sequence
#[derive(Debug, Clone)]
pub struct Retry {
    config: RetryConfig,
    attempts: u32,
}

impl Retry {
    /// Delay before the next retry, or `None` once the attempts are used up
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.config.max_attempts
            && self.attempts >= max
        {
            return None;
        }
        self.attempts += 1;
        Some(match self.config.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step * self.attempts,
        })
    }

    /// Number of retries handed out so far
    #[cfg(test)]
    fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Point in time after which an operation is abandoned
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now; huge timeouts are capped, never overflow
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self { at }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Sleep for `delay`, cut short at the deadline
    pub async fn sleep(&self, delay: Duration) {
        let wake = Instant::now()
            .checked_add(delay)
            .map_or(self.at, |wake| wake.min(self.at));
        tokio::time::sleep_until(wake).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_grows_by_step() {
        let mut retry = RetryConfig::linear(Duration::from_secs(1), None).start();
        assert_eq!(retry.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(retry.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(retry.next_delay(), Some(Duration::from_secs(3)));
        assert_eq!(retry.attempts(), 3);
    }

    #[test]
    fn test_fixed_backoff_stops_after_max_attempts() {
        let mut retry = RetryConfig::fixed(Duration::from_secs(2), Some(2)).start();
        assert_eq!(retry.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(retry.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(retry.next_delay(), None);
    }

    #[test]
    fn test_unbounded_retry_keeps_going() {
        let mut retry = RetryConfig::fixed(Duration::from_millis(1), None).start();
        for _ in 0..1000 {
            assert!(retry.next_delay().is_some());
        }
    }

    #[tokio::test]
    async fn test_unbounded_timeout_does_not_overflow() {
        let deadline = Deadline::after(Duration::MAX);
        assert!(!deadline.expired());
        assert!(deadline.instant() > Instant::now() + Duration::from_secs(86400 * 365));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_sleep_is_cut_short() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let start = Instant::now();
        deadline.sleep(Duration::from_secs(60)).await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(deadline.expired());
    }
}
