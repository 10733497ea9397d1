//! Resilient element location over ordered candidate selectors.
//!
//! Markup in the application under test drifts, so one logical element is
//! described by several selectors. Candidates are tried strictly in
//! declaration order; the first one with a visible match wins and later
//! candidates are never consulted, even if interaction with the winner
//! fails afterwards.

use crate::context::{BrowsingContext, ElementHandle, Probe};
use crate::result::{HarnessError, HarnessResult};
use crate::wait::Deadline;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-candidate wait (2 seconds)
pub const DEFAULT_CANDIDATE_TIMEOUT_MS: u64 = 2_000;

/// Default polling interval while waiting for visibility (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Ordered selectors describing one logical element
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateList(Vec<String>);

impl CandidateList {
    /// Build from selectors in priority order
    #[must_use]
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(selectors.into_iter().map(Into::into).collect())
    }

    /// Single-selector list
    #[must_use]
    pub fn single(selector: impl Into<String>) -> Self {
        Self(vec![selector.into()])
    }

    /// Selectors in priority order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Selectors as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no candidates
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CandidateList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl std::fmt::Display for CandidateList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// What a candidate showed while it was being tried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Selector matched nothing
    NoMatch,
    /// Selector matched elements, none visible
    Hidden {
        /// Number of matched elements
        matches: usize,
    },
    /// Total budget ran out before this candidate was tried
    Skipped,
    /// Selector produced a visible element
    Matched,
}

/// Diagnostic record for one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAttempt {
    /// Selector tried
    pub selector: String,
    /// Last observation
    #[serde(flatten)]
    pub outcome: CandidateOutcome,
    /// Time spent on this candidate
    pub waited_ms: u64,
}

impl CandidateAttempt {
    /// Attempt with no recorded wait time
    #[must_use]
    pub fn new(selector: impl Into<String>, outcome: CandidateOutcome) -> Self {
        Self {
            selector: selector.into(),
            outcome,
            waited_ms: 0,
        }
    }
}

impl std::fmt::Display for CandidateAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.outcome {
            CandidateOutcome::NoMatch => {
                write!(f, "`{}` no match after {}ms", self.selector, self.waited_ms)
            }
            CandidateOutcome::Hidden { matches } => write!(
                f,
                "`{}` {matches} hidden after {}ms",
                self.selector, self.waited_ms
            ),
            CandidateOutcome::Skipped => write!(f, "`{}` skipped (budget spent)", self.selector),
            CandidateOutcome::Matched => write!(f, "`{}` matched", self.selector),
        }
    }
}

/// Locator options for customizing behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorOptions {
    /// How long each candidate may take to become visible
    pub timeout_per_candidate: Duration,
    /// Polling interval for auto-waiting
    pub poll_interval: Duration,
    /// Optional cap over all candidates together
    pub total_budget: Option<Duration>,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            timeout_per_candidate: Duration::from_millis(DEFAULT_CANDIDATE_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            total_budget: None,
        }
    }
}

/// A successfully resolved element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Handle to the visible element
    pub element: ElementHandle,
    /// Position of the winning candidate
    pub candidate_index: usize,
    /// Candidates tried before and including the winner
    pub attempts: Vec<CandidateAttempt>,
}

/// Resolves an element from ordered candidate selectors
#[derive(Debug, Clone, Copy, Default)]
pub struct ResilientLocator {
    options: LocatorOptions,
}

impl ResilientLocator {
    /// Locator with default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator with custom options
    #[must_use]
    pub const fn with_options(options: LocatorOptions) -> Self {
        Self { options }
    }

    /// Set the per-candidate timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_per_candidate: Duration) -> Self {
        self.options.timeout_per_candidate = timeout_per_candidate;
        self
    }

    /// Cap the whole resolution
    #[must_use]
    pub const fn with_total_budget(mut self, budget: Duration) -> Self {
        self.options.total_budget = Some(budget);
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.options.poll_interval = poll_interval;
        self
    }

    /// Get the options
    #[must_use]
    pub const fn options(&self) -> &LocatorOptions {
        &self.options
    }

    /// Resolve the first candidate that shows a visible element.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` with every candidate and its observation when no
    /// candidate becomes visible; `SelectorSyntax` as soon as a malformed
    /// selector is met.
    pub async fn resolve<C: BrowsingContext + ?Sized>(
        &self,
        context: &C,
        candidates: &CandidateList,
    ) -> HarnessResult<Resolved> {
        let overall = self.options.total_budget.map(Deadline::after);
        let mut attempts = Vec::with_capacity(candidates.len());

        for (index, selector) in candidates.iter().enumerate() {
            let budget = match overall {
                Some(deadline) if deadline.expired() => {
                    attempts.push(CandidateAttempt::new(selector, CandidateOutcome::Skipped));
                    continue;
                }
                Some(deadline) => self.options.timeout_per_candidate.min(deadline.remaining()),
                None => self.options.timeout_per_candidate,
            };

            let deadline = Deadline::after(budget);
            let mut last_matches = 0;
            loop {
                let probe = match context.probe(selector).await {
                    Ok(probe) => probe,
                    Err(e @ HarnessError::SelectorSyntax { .. }) => return Err(e),
                    Err(e) => {
                        tracing::trace!(selector, error = %e, "probe failed, retrying");
                        Probe::empty()
                    }
                };
                if let Some(element) = probe.visible {
                    attempts.push(CandidateAttempt {
                        selector: selector.to_string(),
                        outcome: CandidateOutcome::Matched,
                        waited_ms: deadline.elapsed().as_millis() as u64,
                    });
                    tracing::debug!(selector, index, "candidate matched");
                    return Ok(Resolved {
                        element,
                        candidate_index: index,
                        attempts,
                    });
                }
                last_matches = probe.matches;
                if deadline.expired() {
                    break;
                }
                deadline.pause(self.options.poll_interval).await;
            }

            let outcome = if last_matches == 0 {
                CandidateOutcome::NoMatch
            } else {
                CandidateOutcome::Hidden {
                    matches: last_matches,
                }
            };
            tracing::debug!(selector, ?outcome, "candidate exhausted");
            attempts.push(CandidateAttempt {
                selector: selector.to_string(),
                outcome,
                waited_ms: deadline.elapsed().as_millis() as u64,
            });
        }

        Err(HarnessError::ElementNotFound {
            candidates: candidates.as_slice().to_vec(),
            attempts,
        })
    }
}
