//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use vigia::{DeviceProfile, Scenario, ScenarioResult, SuiteObserver, SuiteReport};

/// Progress reporter for suite execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar for multiple runs
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn line(&self, text: &str) {
        match self.progress_bar {
            Some(ref pb) => pb.suspend(|| {
                let _ = self.term.write_line(text);
            }),
            None => {
                let _ = self.term.write_line(text);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a detail line under a failure
    pub fn detail(&self, message: &str) {
        let text = if self.use_color {
            style(message).dim().to_string()
        } else {
            message.to_string()
        };
        self.line(&format!("    {text}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        self.line("");
        self.line(&styled);
    }

    /// Print run summary
    pub fn summary(&self, passed: usize, failed: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }

        self.line("");

        let total = passed + failed;
        let duration_secs = duration.as_secs_f64();

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();

            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };

            self.line(&format!(
                "{} {} scenario runs in {:.2}s ({} passed, {} failed)",
                status,
                total,
                duration_secs,
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            self.line(&format!(
                "{status} {total} scenario runs in {duration_secs:.2}s ({passed} passed, {failed} failed)"
            ));
        }
    }
}

impl SuiteObserver for ProgressReporter {
    fn on_start(&mut self, suite: &str, total: usize) {
        self.header(suite);
        self.start_progress(total as u64, "starting");
    }

    fn on_scenario_start(&mut self, scenario: &Scenario, device: &DeviceProfile) {
        self.set_message(&format!("{} [{}]", scenario.name, device.name));
    }

    fn on_scenario_end(&mut self, result: &ScenarioResult) {
        self.increment(1);
        let label = format!("{} ({:.2}s)", result.label(), result.duration.as_secs_f64());
        if result.passed {
            self.success(&label);
            return;
        }
        self.failure(&label);
        for failure in &result.failures {
            self.detail(&failure.to_string());
        }
        for artifact in &result.artifacts {
            self.detail(&format!("artifact: {}", artifact.display()));
        }
    }

    fn on_finish(&mut self, report: &SuiteReport) {
        self.finish();
        self.summary(report.passed_count(), report.failed_count(), report.duration);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use vigia::{FailureEntry, ResultRecorder, ScenarioPhase, TelemetrySummary};

    fn failed_result() -> ScenarioResult {
        let mut recorder = ResultRecorder::new("admin-requests", "mobile-small");
        recorder.fail(FailureEntry::new(ScenarioPhase::Asserting, "visible [table]", "not found"));
        recorder.finalize(TelemetrySummary::default())
    }

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_quiet_reporter() {
            let reporter = ProgressReporter::new(false, true);
            assert!(reporter.quiet);
        }

        #[test]
        fn test_messages() {
            let reporter = ProgressReporter::new(false, false);
            reporter.success("passed");
            reporter.failure("failed");
            reporter.detail("[asserting] visible [table]: not found");
            reporter.warning("warning");
            reporter.info("info");
            reporter.header("Header");
            reporter.summary(4, 1, Duration::from_secs(3));
        }

        #[test]
        fn test_progress_bar() {
            let mut reporter = ProgressReporter::new(false, false);
            reporter.start_progress(10, "Running");
            reporter.increment(1);
            reporter.set_message("contact [desktop-large]");
            reporter.finish();
        }

        #[test]
        fn test_quiet_mode_suppresses_progress() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_progress(10, "Running");
            assert!(reporter.progress_bar.is_none());
            reporter.failure("shown");
        }
    }

    mod observer_tests {
        use super::*;

        #[test]
        fn test_observer_lifecycle() {
            let mut reporter = ProgressReporter::new(false, true);
            let mut report = SuiteReport::new("crm-smoke");
            reporter.on_start("crm-smoke", 1);
            reporter.on_scenario_start(
                &Scenario::new("admin-requests", "/admin/requests"),
                &vigia::DeviceMatrix::mobile_small(),
            );
            let result = failed_result();
            reporter.on_scenario_end(&result);
            report.results.push(result);
            reporter.on_finish(&report);
            assert_eq!(report.failed_count(), 1);
        }
    }
}
