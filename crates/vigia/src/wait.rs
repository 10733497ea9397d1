//! Wait mechanisms: condition polling with explicit budgets.
//!
//! Every wait in the harness is bounded. Fixed sleeps are replaced by
//! polling a condition until it holds or the budget runs out.

use crate::result::HarnessResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Point in time after which a wait gives up
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// Time spent so far
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left, zero once expired
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    /// Whether the budget is spent
    #[must_use]
    pub fn expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    /// Sleep one poll interval, never past the deadline
    pub async fn pause(&self, poll_interval: Duration) {
        tokio::time::sleep(poll_interval.min(self.remaining())).await;
    }
}

/// Outcome of a bounded wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// Whether the condition held before the budget ran out
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// What was waited for
    pub waited_for: String,
}

impl WaitResult {
    /// Condition met
    #[must_use]
    pub fn success(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: true,
            elapsed,
            waited_for: waited_for.into(),
        }
    }

    /// Budget ran out
    #[must_use]
    pub fn timeout(elapsed: Duration, waited_for: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed,
            waited_for: waited_for.into(),
        }
    }
}

/// Poll `check` until it yields a value or the timeout elapses.
///
/// `check` runs at least once. `Ok(None)` means the budget ran out; errors
/// from `check` end the wait immediately.
pub async fn poll_until<T, F, Fut>(options: &WaitOptions, mut check: F) -> HarnessResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<Option<T>>>,
{
    let deadline = Deadline::after(options.timeout());
    loop {
        if let Some(value) = check().await? {
            return Ok(Some(value));
        }
        if deadline.expired() {
            return Ok(None);
        }
        deadline.pause(options.poll_interval()).await;
    }
}

/// Wait until `sample` returns the same value for `quiet`, at most `max`.
///
/// Used after asynchronous redirects where no single event marks the end.
pub async fn wait_for_stable<T, F, Fut>(
    max: Duration,
    quiet: Duration,
    poll_interval: Duration,
    mut sample: F,
) -> HarnessResult<WaitResult>
where
    T: PartialEq,
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<T>>,
{
    let deadline = Deadline::after(max);
    let mut last = sample().await?;
    let mut unchanged_since = Instant::now();
    loop {
        if unchanged_since.elapsed() >= quiet {
            return Ok(WaitResult::success(deadline.elapsed(), "stable value"));
        }
        if deadline.expired() {
            return Ok(WaitResult::timeout(deadline.elapsed(), "stable value"));
        }
        deadline.pause(poll_interval).await;
        let current = sample().await?;
        if current != last {
            last = current;
            unchanged_since = Instant::now();
        }
    }
}
