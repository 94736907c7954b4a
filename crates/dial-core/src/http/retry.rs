//! Retry logic with exponential backoff for gateway calls
//!
//! Transport failures are always retry-eligible; HTTP responses only for
//! 408, 409 and 429. Each logical call owns a [`RetryState`], so there is no
//! shared retry budget between concurrent calls.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

/// Statuses worth another attempt
const RETRYABLE_STATUSES: [StatusCode; 3] = [
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::CONFLICT,
    StatusCode::TOO_MANY_REQUESTS,
];

/// What a single attempt produced, as far as retrying is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// No response within the per-attempt timeout
    TimedOut,
    /// Any other transport failure
    TransportFailed,
    /// A non-success HTTP response
    Status(StatusCode),
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the exponential delay, applied before jitter
    pub max_delay: Duration,
    /// Half-width of the uniform jitter added to each delay
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy without any waiting between attempts
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Set the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter half-width
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether the outcome of an attempt warrants another one
    pub fn should_retry(&self, outcome: AttemptOutcome) -> bool {
        match outcome {
            AttemptOutcome::TimedOut | AttemptOutcome::TransportFailed => true,
            AttemptOutcome::Status(status) => RETRYABLE_STATUSES.contains(&status),
        }
    }

    /// `min(initial_delay * 2^attempt_index, max_delay)`, without jitter
    pub fn base_delay(&self, attempt_index: u32) -> Duration {
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * 2f64.powi(exponent);
        Duration::from_secs_f64(seconds.min(self.max_delay.as_secs_f64()))
    }

    /// Base delay plus uniform jitter, never negative
    pub fn delay(&self, attempt_index: u32) -> Duration {
        let base = self.base_delay(attempt_index).as_secs_f64();
        let jitter = self.jitter.as_secs_f64();
        let offset = if jitter > 0.0 {
            rand::thread_rng().gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        Duration::from_secs_f64((base + offset).max(0.0))
    }
}

/// Retry bookkeeping for one logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    max_retries: u32,
    remaining: u32,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            remaining: max_retries,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Zero-based index of the retry about to happen
    pub fn attempt_index(&self) -> u32 {
        self.max_retries - self.remaining
    }

    /// Take one unit of the budget; `false` once the budget is spent
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}
