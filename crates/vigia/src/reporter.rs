//! Results and reports.
//!
//! A [`ResultRecorder`] follows one scenario execution and is consumed by
//! [`ResultRecorder::finalize`], so a [`ScenarioResult`] can no longer
//! change once built. A [`SuiteReport`] gathers the results of a run and
//! renders them as text, JSON and JUnit XML.

use crate::assertion::{FailureEntry, SoftAssertions};
use crate::auth::AuthenticatedContext;
use crate::result::HarnessResult;
use crate::scenario::ScenarioPhase;
use crate::telemetry::TelemetrySummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Tracks one scenario execution
#[derive(Debug)]
pub struct ResultRecorder {
    name: String,
    device: String,
    phase: ScenarioPhase,
    reached: ScenarioPhase,
    failures: SoftAssertions,
    artifacts: BTreeSet<PathBuf>,
    authenticated: Option<AuthenticatedContext>,
    started: Instant,
}

impl ResultRecorder {
    /// Start recording
    #[must_use]
    pub fn new(name: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            phase: ScenarioPhase::Pending,
            reached: ScenarioPhase::Pending,
            failures: SoftAssertions::new(),
            artifacts: BTreeSet::new(),
            authenticated: None,
            started: Instant::now(),
        }
    }

    /// Move to `phase`
    pub fn enter(&mut self, phase: ScenarioPhase) {
        tracing::debug!(from = %self.phase, to = %phase, "phase");
        if phase != ScenarioPhase::Reporting {
            self.reached = phase;
        }
        self.phase = phase;
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> ScenarioPhase {
        self.phase
    }

    /// Record a failure
    pub fn fail(&mut self, failure: FailureEntry) {
        self.failures.record(failure);
    }

    /// Whether nothing has failed so far
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.all_passed()
    }

    /// Record an artifact path
    pub fn add_artifact(&mut self, path: PathBuf) {
        self.artifacts.insert(path);
    }

    /// Record the login performed for this scenario
    pub fn authenticated(&mut self, auth: AuthenticatedContext) {
        self.authenticated = Some(auth);
    }

    /// Build the immutable result
    #[must_use]
    pub fn finalize(self, telemetry: TelemetrySummary) -> ScenarioResult {
        let passed = self.failures.all_passed();
        let result = ScenarioResult {
            name: self.name,
            device: self.device,
            passed,
            phase: if passed {
                ScenarioPhase::Passed
            } else {
                ScenarioPhase::Failed
            },
            reached: self.reached,
            failures: self.failures.into_failures(),
            artifacts: self.artifacts,
            duration: self.started.elapsed(),
            telemetry,
            authenticated: self.authenticated,
        };
        tracing::info!(
            passed = result.passed,
            failures = result.failures.len(),
            duration_ms = result.duration.as_millis() as u64,
            "scenario finished"
        );
        result
    }
}

/// Outcome of one scenario on one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub name: String,
    /// Device profile name
    pub device: String,
    /// True iff no failure was recorded
    pub passed: bool,
    /// `Passed` or `Failed`
    pub phase: ScenarioPhase,
    /// Last phase entered before reporting
    pub reached: ScenarioPhase,
    /// Failures in recording order
    pub failures: Vec<FailureEntry>,
    /// Screenshots and logs written
    pub artifacts: BTreeSet<PathBuf>,
    /// Wall time
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Telemetry counts
    pub telemetry: TelemetrySummary,
    /// Login performed, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<AuthenticatedContext>,
}

impl ScenarioResult {
    /// "name [device]"
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} [{}]", self.name, self.device)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Results of a suite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Suite name
    pub suite: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall time of the run
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// One entry per scenario and device, in execution order
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    /// Empty report for `suite`, stamped now
    #[must_use]
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            suite: suite.into(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
            results: Vec::new(),
        }
    }

    /// Get passed count
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Get failed count
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count()
    }

    /// Check if all scenarios passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Failed results
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Generate summary string
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} passed, {} failed in {:.2}s",
            self.suite,
            self.passed_count(),
            self.results.len(),
            self.failed_count(),
            self.duration.as_secs_f64()
        )
    }

    /// Human-readable report listing every failure with its context
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.summary());
        for result in &self.results {
            let mark = if result.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(
                out,
                "{mark} {} ({:.2}s, telemetry: {} errors, {} warnings)",
                result.label(),
                result.duration.as_secs_f64(),
                result.telemetry.errors(),
                result.telemetry.console_warnings
            );
            if result.passed {
                continue;
            }
            let _ = writeln!(out, "  stopped after: {}", result.reached);
            for (i, failure) in result.failures.iter().enumerate() {
                let _ = writeln!(out, "  {}. {failure}", i + 1);
            }
            for artifact in &result.artifacts {
                let _ = writeln!(out, "  artifact: {}", artifact.display());
            }
        }
        out
    }

    /// Write the JSON report
    ///
    /// # Errors
    ///
    /// Returns error if file writing fails
    pub fn write_json(&self, output_path: &Path) -> HarnessResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(output_path, json)?;
        Ok(())
    }

    /// Generate JUnit XML for CI integration
    ///
    /// # Errors
    ///
    /// Returns error if file writing fails
    pub fn write_junit(&self, output_path: &Path) -> HarnessResult<()> {
        std::fs::write(output_path, self.render_junit())?;
        Ok(())
    }

    /// Render JUnit XML content
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuite name="{}" tests="{}" failures="{}" time="{:.3}">"#,
            escape_xml(&self.suite),
            self.results.len(),
            self.failed_count(),
            self.duration.as_secs_f64()
        ));
        xml.push('\n');

        for result in &self.results {
            xml.push_str(&format!(
                r#"  <testcase name="{}" classname="{}" time="{:.3}">"#,
                escape_xml(&result.name),
                escape_xml(&result.device),
                result.duration.as_secs_f64()
            ));
            xml.push('\n');

            if let Some(first) = result.failures.first() {
                let body = result
                    .failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n");
                xml.push_str(&format!(
                    r#"    <failure message="{}">{}</failure>"#,
                    escape_xml(&first.message),
                    escape_xml(&body)
                ));
                xml.push('\n');
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
