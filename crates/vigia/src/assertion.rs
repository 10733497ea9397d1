//! Declarative checks and soft failure collection.
//!
//! Checks never stop each other: every failing check becomes a
//! [`FailureEntry`] in a [`SoftAssertions`] collector and evaluation moves on.

use crate::context::BrowsingContext;
use crate::locator::{CandidateList, ResilientLocator};
use crate::result::HarnessError;
use crate::scenario::ScenarioPhase;
use crate::telemetry::{TelemetryCategory, TelemetryCollector, TelemetryRecord, TextMatcher};
use serde::{Deserialize, Serialize};

/// Longest observed value kept in a failure entry
const MAX_OBSERVED_CHARS: usize = 300;

/// Records listed per telemetry failure
const MAX_LISTED_RECORDS: usize = 5;

/// One recorded failure, with enough context to reproduce it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Phase the failure happened in
    pub phase: ScenarioPhase,
    /// Step or check description
    pub step: String,
    /// What went wrong
    pub message: String,
    /// Expected condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// What was actually seen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<String>,
    /// Selectors tried
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<String>,
}

impl FailureEntry {
    /// Create a failure entry
    #[must_use]
    pub fn new(phase: ScenarioPhase, step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase,
            step: step.into(),
            message: message.into(),
            expected: None,
            observed: None,
            selectors: Vec::new(),
        }
    }

    /// Failure caused by an error; selectors come from `ElementNotFound`
    #[must_use]
    pub fn from_error(phase: ScenarioPhase, step: impl Into<String>, error: &HarnessError) -> Self {
        let mut entry = Self::new(phase, step, error.to_string());
        if let HarnessError::ElementNotFound { candidates, .. } = error {
            entry.selectors.clone_from(candidates);
        }
        entry
    }

    /// Set the expected condition
    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Set the observed value (truncated)
    #[must_use]
    pub fn with_observed(mut self, observed: impl Into<String>) -> Self {
        self.observed = Some(truncate(&observed.into()));
        self
    }

    /// Set the selectors tried
    #[must_use]
    pub fn with_selectors(mut self, selectors: &CandidateList) -> Self {
        self.selectors = selectors.as_slice().to_vec();
        self
    }
}

impl std::fmt::Display for FailureEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.phase, self.step, self.message)?;
        if let Some(ref expected) = self.expected {
            write!(f, "; expected {expected}")?;
        }
        if let Some(ref observed) = self.observed {
            write!(f, "; observed {observed:?}")?;
        }
        if !self.selectors.is_empty() {
            write!(f, " (selectors: {})", self.selectors.join(", "))?;
        }
        Ok(())
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_OBSERVED_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_OBSERVED_CHARS).collect();
    cut.push('…');
    cut
}

/// Soft assertions collector
///
/// Collects failures without stopping the scenario.
#[derive(Debug, Default)]
pub struct SoftAssertions {
    failures: Vec<FailureEntry>,
}

impl SoftAssertions {
    /// Create a new soft assertions collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn record(&mut self, failure: FailureEntry) {
        tracing::debug!(%failure, "failure recorded");
        self.failures.push(failure);
    }

    /// Get all failures
    #[must_use]
    pub fn failures(&self) -> &[FailureEntry] {
        &self.failures
    }

    /// Number of failures
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if all assertions passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Take the failures in recording order
    #[must_use]
    pub fn into_failures(self) -> Vec<FailureEntry> {
        self.failures
    }
}

// ============================================================================
// Declarative checks
// ============================================================================

/// A post-action condition on the page or its telemetry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    /// An element from the candidates is visible
    Visible {
        /// Candidate selectors
        selectors: CandidateList,
    },
    /// The resolved element's text contains `text`
    TextContains {
        /// Candidate selectors
        selectors: CandidateList,
        /// Expected substring
        text: String,
    },
    /// The current location contains `text`
    UrlContains {
        /// Expected substring
        text: String,
    },
    /// No console-error records, except those containing an ignored term
    NoConsoleErrors {
        /// Substrings that excuse a record
        #[serde(default)]
        ignore: Vec<String>,
    },
    /// No network-failure records, except those containing an ignored term
    NoNetworkFailures {
        /// Substrings that excuse a record
        #[serde(default)]
        ignore: Vec<String>,
    },
    /// No record matches
    TelemetryAbsent {
        /// Record filter
        #[serde(flatten)]
        matcher: TextMatcher,
    },
    /// At least one record matches
    TelemetryPresent {
        /// Record filter
        #[serde(flatten)]
        matcher: TextMatcher,
    },
}

impl Check {
    /// Candidate selectors used by this check
    #[must_use]
    pub fn selectors(&self) -> Option<&CandidateList> {
        match self {
            Self::Visible { selectors } | Self::TextContains { selectors, .. } => Some(selectors),
            _ => None,
        }
    }

    /// Short description for reports
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Visible { selectors } => format!("visible {selectors}"),
            Self::TextContains { selectors, text } => format!("text_contains {selectors} {text:?}"),
            Self::UrlContains { text } => format!("url_contains {text:?}"),
            Self::NoConsoleErrors { .. } => "no_console_errors".to_string(),
            Self::NoNetworkFailures { .. } => "no_network_failures".to_string(),
            Self::TelemetryAbsent { matcher } => {
                format!("telemetry_absent {}", describe_matcher(matcher))
            }
            Self::TelemetryPresent { matcher } => {
                format!("telemetry_present {}", describe_matcher(matcher))
            }
        }
    }

    /// Evaluate against the page and the scenario's telemetry.
    ///
    /// Returns `None` when the check holds. Errors while evaluating are
    /// reported as failures of this check.
    pub async fn evaluate<C: BrowsingContext + ?Sized>(
        &self,
        context: &C,
        telemetry: &mut TelemetryCollector,
        locator: &ResilientLocator,
    ) -> Option<FailureEntry> {
        let phase = ScenarioPhase::Asserting;
        let step = self.describe();
        match self {
            Self::Visible { selectors } => match locator.resolve(context, selectors).await {
                Ok(_) => None,
                Err(e) => {
                    Some(FailureEntry::from_error(phase, step, &e).with_selectors(selectors))
                }
            },
            Self::TextContains { selectors, text } => {
                let resolved = match locator.resolve(context, selectors).await {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        return Some(
                            FailureEntry::from_error(phase, step, &e).with_selectors(selectors),
                        );
                    }
                };
                match context.text_of(&resolved.element).await {
                    Ok(actual) if actual.contains(text.as_str()) => None,
                    Ok(actual) => Some(
                        FailureEntry::new(phase, step, "text mismatch")
                            .with_expected(format!("text containing {text:?}"))
                            .with_observed(actual)
                            .with_selectors(selectors),
                    ),
                    Err(e) => {
                        Some(FailureEntry::from_error(phase, step, &e).with_selectors(selectors))
                    }
                }
            }
            Self::UrlContains { text } => match context.current_url().await {
                Ok(url) if url.contains(text.as_str()) => None,
                Ok(url) => Some(
                    FailureEntry::new(phase, step, "unexpected location")
                        .with_expected(format!("url containing {text:?}"))
                        .with_observed(url),
                ),
                Err(e) => Some(FailureEntry::from_error(phase, step, &e)),
            },
            Self::NoConsoleErrors { ignore } => {
                let found = telemetry.errors_matching(&|r: &TelemetryRecord| {
                    r.category == TelemetryCategory::ConsoleError && !excused(r, ignore)
                });
                unexpected_records(phase, step, "console error", &found)
            }
            Self::NoNetworkFailures { ignore } => {
                let found = telemetry.errors_matching(&|r: &TelemetryRecord| {
                    r.category == TelemetryCategory::NetworkFailure && !excused(r, ignore)
                });
                unexpected_records(phase, step, "network failure", &found)
            }
            Self::TelemetryAbsent { matcher } => {
                let found = telemetry.records_matching(matcher);
                unexpected_records(phase, step, "matching record", &found)
            }
            Self::TelemetryPresent { matcher } => {
                if telemetry.records_matching(matcher).is_empty() {
                    Some(
                        FailureEntry::new(phase, step, "no matching telemetry record")
                            .with_expected(describe_matcher(matcher)),
                    )
                } else {
                    None
                }
            }
        }
    }
}

fn excused(record: &TelemetryRecord, ignore: &[String]) -> bool {
    ignore
        .iter()
        .any(|term| record.message.contains(term.as_str()) || record.source.contains(term.as_str()))
}

fn unexpected_records(
    phase: ScenarioPhase,
    step: String,
    what: &str,
    found: &[TelemetryRecord],
) -> Option<FailureEntry> {
    if found.is_empty() {
        return None;
    }
    let listed = found
        .iter()
        .take(MAX_LISTED_RECORDS)
        .map(|r| format!("[{}] {}", r.category, r.message))
        .collect::<Vec<_>>()
        .join(" | ");
    Some(
        FailureEntry::new(phase, step, format!("{} unexpected {what}(s)", found.len()))
            .with_expected(format!("no {what}"))
            .with_observed(listed),
    )
}

fn describe_matcher(matcher: &TextMatcher) -> String {
    let mut parts = Vec::new();
    if let Some(category) = matcher.category {
        parts.push(format!("category={category}"));
    }
    parts.extend(matcher.contains.iter().map(|t| format!("contains {t:?}")));
    parts.extend(matcher.excludes.iter().map(|t| format!("excludes {t:?}")));
    if parts.is_empty() {
        "any record".to_string()
    } else {
        parts.join(" and ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::{ConsoleLevel, PageSignal};
    use crate::mock::{MockContext, MockElement};
    use std::time::Duration;

    fn locator() -> ResilientLocator {
        ResilientLocator::new().with_timeout(Duration::from_millis(100))
    }

    mod failure_entry_tests {
        use super::*;

        #[test]
        fn test_display_carries_context() {
            let entry =
                FailureEntry::new(ScenarioPhase::Asserting, "text_contains [h1]", "text mismatch")
                    .with_expected("text containing \"Requests\"")
                    .with_observed("Dashboard")
                    .with_selectors(&CandidateList::new(["h1", ".title"]));
            let text = entry.to_string();
            assert!(text.contains("[asserting]"));
            assert!(text.contains("Dashboard"));
            assert!(text.contains("h1, .title"));
        }

        #[test]
        fn test_observed_truncated() {
            let entry =
                FailureEntry::new(ScenarioPhase::Acting, "x", "y").with_observed("a".repeat(1_000));
            assert!(entry.observed.unwrap().chars().count() <= MAX_OBSERVED_CHARS + 1);
        }

        #[test]
        fn test_soft_assertions_keep_order() {
            let mut soft = SoftAssertions::new();
            soft.record(FailureEntry::new(ScenarioPhase::Asserting, "first", "a"));
            soft.record(FailureEntry::new(ScenarioPhase::Asserting, "second", "b"));
            assert_eq!(soft.failure_count(), 2);
            assert_eq!(soft.into_failures()[1].step, "second");
        }
    }

    mod check_tests {
        use super::*;

        #[test]
        fn test_yaml_forms() {
            let checks: Vec<Check> = serde_yaml_ng::from_str(
                r#"
- { check: visible, selectors: ["table", "[role=grid]"] }
- { check: no_console_errors, ignore: ["favicon"] }
- { check: telemetry_absent, contains: ["fallback"], excludes: ["✓"] }
"#,
            )
            .unwrap();
            assert_eq!(checks.len(), 3);
            let Check::TelemetryAbsent { matcher } = &checks[2] else {
                panic!("expected telemetry_absent");
            };
            assert_eq!(matcher.excludes, vec!["✓"]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_text_contains_mismatch() {
            let ctx =
                MockContext::new().with_element(MockElement::new("h1").with_text("Dashboard"));
            let mut telemetry = TelemetryCollector::new();
            let check = Check::TextContains {
                selectors: CandidateList::single("h1"),
                text: "Requests".into(),
            };
            let failure = check.evaluate(&ctx, &mut telemetry, &locator()).await.unwrap();
            assert_eq!(failure.observed.as_deref(), Some("Dashboard"));
            assert_eq!(failure.selectors, vec!["h1"]);
        }

        #[tokio::test]
        async fn test_console_errors_respect_ignore() {
            let ctx = MockContext::new();
            let mut telemetry = TelemetryCollector::new();
            telemetry.attach(&ctx).await.unwrap();
            ctx.emit(PageSignal::console(ConsoleLevel::Error, "GET /favicon.ico 404"));
            let lenient = Check::NoConsoleErrors {
                ignore: vec!["favicon".into()],
            };
            assert!(lenient.evaluate(&ctx, &mut telemetry, &locator()).await.is_none());
            ctx.emit(PageSignal::console(ConsoleLevel::Log, "Error: X not available"));
            let failure = lenient.evaluate(&ctx, &mut telemetry, &locator()).await.unwrap();
            assert!(failure.message.starts_with("1 unexpected"));
        }

        #[tokio::test]
        async fn test_telemetry_present() {
            let ctx = MockContext::new();
            let mut telemetry = TelemetryCollector::new();
            telemetry.attach(&ctx).await.unwrap();
            let check = Check::TelemetryPresent {
                matcher: TextMatcher::new().contains("notification sent"),
            };
            assert!(check.evaluate(&ctx, &mut telemetry, &locator()).await.is_some());
            ctx.emit(PageSignal::console(ConsoleLevel::Log, "✓ Fallback notification sent"));
            assert!(check.evaluate(&ctx, &mut telemetry, &locator()).await.is_none());
        }
    }
}
