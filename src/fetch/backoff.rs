// src/fetch/backoff.rs
//! Retry eligibility and delay schedule for failed page requests.
//!
//! Pure: the policy never sleeps, the page fetcher does.

use std::time::Duration;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self { base, max_retries }
    }

    /// 429 (rate limited), 502 and 503 (transient upstream failure).
    pub fn is_retryable(status: u16) -> bool {
        matches!(status, 429 | 502 | 503)
    }

    /// Decide what to do after attempt number `attempt` (1-based) failed
    /// with `status`. Non-retryable statuses give up immediately.
    pub fn decide(&self, attempt: u32, status: u16) -> RetryDecision {
        if !Self::is_retryable(status) {
            return RetryDecision::GiveUp;
        }
        self.schedule(attempt)
    }

    /// Same as [`decide`](Self::decide) but lets a server `Retry-After`
    /// hint replace the scheduled delay. The retry cap still applies and the
    /// hint never exceeds [`max_delay`](Self::max_delay).
    pub fn decide_with_hint(
        &self,
        attempt: u32,
        status: u16,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        match self.decide(attempt, status) {
            RetryDecision::Retry(delay) => RetryDecision::Retry(
                retry_after.map_or(delay, |hint| hint.min(self.max_delay())),
            ),
            RetryDecision::GiveUp => RetryDecision::GiveUp,
        }
    }

    /// Longest scheduled wait: the delay before the final retry.
    pub fn max_delay(&self) -> Duration {
        match self.schedule(self.max_retries) {
            RetryDecision::Retry(delay) => delay,
            RetryDecision::GiveUp => self.base,
        }
    }

    /// Schedule for a retryable failure regardless of status
    /// (transport errors have none): `base * 2^(attempt-1)` while
    /// `attempt <= max_retries`.
    pub fn schedule(&self, attempt: u32) -> RetryDecision {
        if attempt == 0 || attempt > self.max_retries {
            return RetryDecision::GiveUp;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        RetryDecision::Retry(self.base.saturating_mul(factor))
    }
}
