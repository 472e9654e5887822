//! Retry policy and exponential backoff.

use std::{fmt, sync::Arc, time::Duration};

use crate::SplashError;

type RetryOn = Arc<dyn Fn(u16) -> bool + Send + Sync>;

/// Retries used by the `true` shorthand.
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_FACTOR: f64 = 2.0;
pub const DEFAULT_MIN_TIMEOUT_MS: u64 = 300;
pub const DEFAULT_MAX_TIMEOUT_MS: u64 = 2_000;

/// Retries `5xx` and `429`.
pub fn default_retry_on(status: u16) -> bool {
    status >= 500 || status == 429
}

/// How and when a failed attempt is repeated.
#[derive(Clone)]
pub struct RetryPolicy {
    retries: u32,
    factor: f64,
    min_timeout_ms: u64,
    max_timeout_ms: u64,
    retry_on: RetryOn,
}

impl RetryPolicy {
    /// `retries` extra attempts with the default backoff and status predicate.
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            factor: DEFAULT_FACTOR,
            min_timeout_ms: DEFAULT_MIN_TIMEOUT_MS,
            max_timeout_ms: DEFAULT_MAX_TIMEOUT_MS,
            retry_on: Arc::new(default_retry_on),
        }
    }

    /// Backoff multiplier; values below 1 (or NaN) are raised to 1.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = if factor >= 1.0 { factor } else { 1.0 };
        self
    }

    /// Backoff bounds in milliseconds; `max_ms` is raised to `min_ms` if lower.
    pub fn with_backoff(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.min_timeout_ms = min_ms;
        self.max_timeout_ms = max_ms.max(min_ms);
        self
    }

    /// Status predicate for [`SplashError::Http`] errors.
    pub fn with_retry_on<F>(mut self, retry_on: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Arc::new(retry_on);
        self
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn min_timeout_ms(&self) -> u64 {
        self.min_timeout_ms
    }

    pub fn max_timeout_ms(&self) -> u64 {
        self.max_timeout_ms
    }

    pub fn retries_status(&self, status: u16) -> bool {
        (self.retry_on)(status)
    }

    /// Delay after the failed attempt `attempt` (1-based):
    /// `min(max, min * factor^(attempt - 1))`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.min_timeout_ms as f64 * self.factor.powi(exponent);
        let capped = delay.min(self.max_timeout_ms as f64);
        Duration::from_millis(capped.round() as u64)
    }

    /// Whether the failed attempt `attempt` (1-based) should be repeated.
    ///
    /// Rate-limit and timeout errors always qualify; HTTP errors qualify when
    /// the status predicate accepts them; any other error never does.
    pub fn should_retry(&self, error: &SplashError, attempt: u32) -> bool {
        if attempt > self.retries {
            return false;
        }
        match error {
            SplashError::RateLimit { .. } | SplashError::Timeout { .. } => true,
            SplashError::Http(http) => self.retries_status(http.status),
            SplashError::Api { .. } => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retries", &self.retries)
            .field("factor", &self.factor)
            .field("min_timeout_ms", &self.min_timeout_ms)
            .field("max_timeout_ms", &self.max_timeout_ms)
            .finish_non_exhaustive()
    }
}

/// Retry setting for a client or a single call.
///
/// `true` converts to [`Retry::Enabled`], `false` to [`Retry::Disabled`].
#[derive(Clone, Debug, Default)]
pub enum Retry {
    #[default]
    Disabled,
    /// [`DEFAULT_RETRIES`] retries with the default backoff.
    Enabled,
    Policy(RetryPolicy),
}

impl Retry {
    pub(crate) fn resolve(&self) -> Option<RetryPolicy> {
        match self {
            Self::Disabled => None,
            Self::Enabled => Some(RetryPolicy::default()),
            Self::Policy(policy) => Some(policy.clone()),
        }
    }
}

impl From<bool> for Retry {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

impl From<RetryPolicy> for Retry {
    fn from(policy: RetryPolicy) -> Self {
        Self::Policy(policy)
    }
}
