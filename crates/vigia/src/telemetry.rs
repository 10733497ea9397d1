//! Telemetry collection: console and network signals as categorized records.
//!
//! A [`TelemetryCollector`] belongs to exactly one scenario execution. It
//! subscribes to a browsing context's signal stream on [`attach`], turns
//! every console message, uncaught exception and failing request into a
//! [`TelemetryRecord`], and keeps them until [`reset`] is called.
//!
//! [`attach`]: TelemetryCollector::attach
//! [`reset`]: TelemetryCollector::reset

use crate::context::{BrowsingContext, ConsoleLevel, PageSignal, SignalReceiver};
use crate::result::HarnessResult;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

/// Record category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TelemetryCategory {
    /// console.error, uncaught exception, or error-prefixed text
    ConsoleError,
    /// console.warn or warning-prefixed text
    ConsoleWarning,
    /// Any other console output
    ConsoleLog,
    /// HTTP status >= 400 or a request that never got a response
    NetworkFailure,
}

impl TelemetryCategory {
    /// Whether records of this category count as errors
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::ConsoleError | Self::NetworkFailure)
    }
}

impl std::fmt::Display for TelemetryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ConsoleError => "console-error",
            Self::ConsoleWarning => "console-warning",
            Self::ConsoleLog => "console-log",
            Self::NetworkFailure => "network-failure",
        };
        f.write_str(name)
    }
}

/// One categorized console or network observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Category
    pub category: TelemetryCategory,
    /// Message text
    pub message: String,
    /// When the page emitted the signal
    pub timestamp: DateTime<Utc>,
    /// Console level or request URL
    pub source: String,
}

impl TelemetryRecord {
    /// Create a record stamped now
    #[must_use]
    pub fn new(
        category: TelemetryCategory,
        message: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            timestamp: Utc::now(),
            source: source.into(),
        }
    }

    /// Categorize a raw page signal.
    ///
    /// Responses below 400 produce no record.
    #[must_use]
    pub fn from_signal(signal: PageSignal) -> Option<Self> {
        let record = match signal {
            PageSignal::Console { level, text, at } => Self {
                category: classify_console(level, &text),
                message: text,
                timestamp: at,
                source: level.to_string(),
            },
            PageSignal::Exception { text, at } => Self {
                category: TelemetryCategory::ConsoleError,
                message: text,
                timestamp: at,
                source: "exception".to_string(),
            },
            PageSignal::Response {
                method,
                url,
                status,
                at,
            } => {
                if status < 400 {
                    return None;
                }
                Self {
                    category: TelemetryCategory::NetworkFailure,
                    message: format!("{method} {url} -> {status}"),
                    timestamp: at,
                    source: url,
                }
            }
            PageSignal::RequestFailed {
                method,
                url,
                error,
                at,
            } => Self {
                category: TelemetryCategory::NetworkFailure,
                message: format!("{method} {url} failed: {error}"),
                timestamp: at,
                source: url,
            },
        };
        Some(record)
    }
}

fn error_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(uncaught\b|\w*error\s*:)").expect("error prefix pattern is valid")
    })
}

fn warning_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*warn(ing)?\s*:").expect("warning prefix pattern is valid")
    })
}

fn classify_console(level: ConsoleLevel, text: &str) -> TelemetryCategory {
    if level == ConsoleLevel::Error || error_prefix().is_match(text) {
        TelemetryCategory::ConsoleError
    } else if level == ConsoleLevel::Warning || warning_prefix().is_match(text) {
        TelemetryCategory::ConsoleWarning
    } else {
        TelemetryCategory::ConsoleLog
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// Filter over telemetry records
pub trait RecordPredicate {
    /// Whether the record is selected
    fn matches(&self, record: &TelemetryRecord) -> bool;
}

impl<F> RecordPredicate for F
where
    F: Fn(&TelemetryRecord) -> bool,
{
    fn matches(&self, record: &TelemetryRecord) -> bool {
        self(record)
    }
}

/// Substring matcher: every `contains` term present, no `excludes` term
/// present, and the category equal when one is given
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatcher {
    /// Terms that must all appear
    #[serde(default)]
    pub contains: Vec<String>,
    /// Terms that must not appear
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Restrict to one category
    #[serde(default)]
    pub category: Option<TelemetryCategory>,
}

impl TextMatcher {
    /// Matcher accepting every record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a substring
    #[must_use]
    pub fn contains(mut self, term: impl Into<String>) -> Self {
        self.contains.push(term.into());
        self
    }

    /// Forbid a substring
    #[must_use]
    pub fn excludes(mut self, term: impl Into<String>) -> Self {
        self.excludes.push(term.into());
        self
    }

    /// Restrict to a category
    #[must_use]
    pub const fn in_category(mut self, category: TelemetryCategory) -> Self {
        self.category = Some(category);
        self
    }
}

impl RecordPredicate for TextMatcher {
    fn matches(&self, record: &TelemetryRecord) -> bool {
        self.category.map_or(true, |c| c == record.category)
            && self.contains.iter().all(|t| record.message.contains(t.as_str()))
            && !self.excludes.iter().any(|t| record.message.contains(t.as_str()))
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Identifies one subscription; stale handles are ignored by `detach`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachHandle(u64);

/// Counts per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    /// console-error records
    pub console_errors: usize,
    /// console-warning records
    pub console_warnings: usize,
    /// console-log records
    pub console_logs: usize,
    /// network-failure records
    pub network_failures: usize,
}

impl TelemetrySummary {
    /// Error-category records
    #[must_use]
    pub const fn errors(&self) -> usize {
        self.console_errors + self.network_failures
    }
}

#[derive(Debug)]
struct Subscription {
    handle: AttachHandle,
    receiver: SignalReceiver,
}

/// Accumulates telemetry for one scenario execution
#[derive(Debug, Default)]
pub struct TelemetryCollector {
    records: Vec<TelemetryRecord>,
    subscription: Option<Subscription>,
    next_handle: u64,
}

impl TelemetryCollector {
    /// Create a detached, empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `context`, replacing any current subscription.
    ///
    /// Signals still queued on a replaced subscription are collected first.
    pub async fn attach<C: BrowsingContext + ?Sized>(
        &mut self,
        context: &C,
    ) -> HarnessResult<AttachHandle> {
        self.pump();
        let receiver = context.subscribe().await?;
        self.next_handle += 1;
        let handle = AttachHandle(self.next_handle);
        self.subscription = Some(Subscription { handle, receiver });
        tracing::debug!(handle = handle.0, "telemetry attached");
        Ok(handle)
    }

    /// Stop collecting. No-op for a stale handle or when detached.
    pub fn detach(&mut self, handle: AttachHandle) {
        if self.subscription.as_ref().map(|s| s.handle) != Some(handle) {
            return;
        }
        self.pump();
        self.subscription = None;
        tracing::debug!(handle = handle.0, records = self.records.len(), "telemetry detached");
    }

    /// Whether a subscription is active
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Drop every record, including signals emitted but not yet read
    pub fn reset(&mut self) {
        if let Some(sub) = self.subscription.as_mut() {
            while sub.receiver.try_recv().is_ok() {}
        }
        self.records.clear();
    }

    /// Every record so far, in arrival order
    pub fn records(&mut self) -> &[TelemetryRecord] {
        self.pump();
        &self.records
    }

    /// Error-category records satisfying `predicate`, in arrival order
    pub fn errors_matching<P: RecordPredicate + ?Sized>(
        &mut self,
        predicate: &P,
    ) -> Vec<TelemetryRecord> {
        self.pump();
        self.records
            .iter()
            .filter(|r| r.category.is_error() && predicate.matches(r))
            .cloned()
            .collect()
    }

    /// Records of any category satisfying `predicate`, in arrival order
    pub fn records_matching<P: RecordPredicate + ?Sized>(
        &mut self,
        predicate: &P,
    ) -> Vec<TelemetryRecord> {
        self.pump();
        self.records
            .iter()
            .filter(|r| predicate.matches(r))
            .cloned()
            .collect()
    }

    /// Counts per category
    pub fn summary(&mut self) -> TelemetrySummary {
        self.pump();
        let mut summary = TelemetrySummary::default();
        for record in &self.records {
            match record.category {
                TelemetryCategory::ConsoleError => summary.console_errors += 1,
                TelemetryCategory::ConsoleWarning => summary.console_warnings += 1,
                TelemetryCategory::ConsoleLog => summary.console_logs += 1,
                TelemetryCategory::NetworkFailure => summary.network_failures += 1,
            }
        }
        summary
    }

    /// Write every record as one JSON object per line
    pub fn write_jsonl(&mut self, path: &Path) -> HarnessResult<()> {
        self.pump();
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for record in &self.records {
            serde_json::to_writer(&mut file, record)?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        Ok(())
    }

    fn pump(&mut self) {
        let Some(sub) = self.subscription.as_mut() else {
            return;
        };
        while let Ok(signal) = sub.receiver.try_recv() {
            if let Some(record) = TelemetryRecord::from_signal(signal) {
                tracing::trace!(
                    category = %record.category,
                    message = %record.message,
                    "telemetry"
                );
                self.records.push(record);
            }
        }
    }
}
