//! Suite files and the suite runner.
//!
//! A suite is a YAML document naming the application, its login wiring, the
//! device profiles to cover and the scenarios to run:
//!
//! ```yaml
//! version: "1"
//! name: crm-smoke
//! base_url: https://crm.example.test
//! devices: [mobile-small, desktop-large]
//! scenarios:
//!   - name: admin-requests-table
//!     route: /admin/requests
//!     assertions:
//!       - { check: visible, selectors: ["table", "[role=grid]"] }
//! ```
//!
//! [`SuiteRunner`] expands scenarios x devices, runs them one after another
//! and collects a [`SuiteReport`].

use crate::auth::{AuthConfig, AuthSession};
use crate::context::ContextFactory;
use crate::device::{DeviceMatrix, DeviceProfile};
use crate::locator::CandidateList;
use crate::reporter::{ScenarioResult, SuiteReport};
use crate::result::{HarnessError, HarnessResult};
use crate::scenario::{RunnerConfig, Scenario, ScenarioRunner, Step};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

/// Supported suite format version
pub const SUITE_VERSION: &str = "1";

/// Runner knobs a suite may override
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Navigation budget in milliseconds
    pub navigation_timeout_ms: Option<u64>,
    /// Per-candidate element budget in milliseconds
    pub candidate_timeout_ms: Option<u64>,
    /// Cap on one element resolution across all its candidates
    pub total_budget_ms: Option<u64>,
    /// Screenshot passing scenarios too
    pub screenshot_on_success: bool,
}

/// A parsed suite file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    /// Format version, must be "1"
    pub version: String,
    /// Suite name
    pub name: String,
    /// Application base URL
    pub base_url: String,
    /// Login wiring
    #[serde(default)]
    pub auth: AuthConfig,
    /// Device names to cover; empty means every known profile
    #[serde(default)]
    pub devices: Vec<String>,
    /// Profiles added to the standard catalog
    #[serde(default)]
    pub custom_devices: Vec<DeviceProfile>,
    /// Runner overrides
    #[serde(default)]
    pub settings: RunSettings,
    /// Scenarios, in execution order
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    /// Parse and validate a suite from YAML
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let suite: Self = serde_yaml_ng::from_str(yaml)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Read, parse and validate a suite file
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        let suite = Self::from_yaml(&yaml)?;
        tracing::debug!(path = %path.display(), scenarios = suite.scenarios.len(), "loaded suite");
        Ok(suite)
    }

    /// Check the suite structure
    pub fn validate(&self) -> HarnessResult<()> {
        if self.version != SUITE_VERSION {
            return Err(HarnessError::suite(format!(
                "unsupported version {:?} (expected {SUITE_VERSION:?})",
                self.version
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(HarnessError::suite("base_url is empty"));
        }
        if self.scenarios.is_empty() {
            return Err(HarnessError::suite("no scenarios"));
        }

        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if scenario.name.trim().is_empty() {
                return Err(HarnessError::suite(format!(
                    "scenario for route {} has an empty name",
                    scenario.route
                )));
            }
            if !seen.insert(scenario.name.as_str()) {
                return Err(HarnessError::suite(format!(
                    "duplicate scenario name {:?}",
                    scenario.name
                )));
            }
            validate_scenario(scenario)?;
        }

        for profile in &self.custom_devices {
            profile
                .validate()
                .map_err(|e| HarnessError::suite(format!("custom device: {e}")))?;
        }
        self.matrix()?;
        Ok(())
    }

    /// Standard catalog plus custom profiles
    pub fn catalog(&self) -> HarnessResult<DeviceMatrix> {
        let mut matrix = DeviceMatrix::standard();
        for profile in &self.custom_devices {
            matrix.register(profile.clone())?;
        }
        Ok(matrix)
    }

    /// Catalog narrowed to `devices`
    pub fn matrix(&self) -> HarnessResult<DeviceMatrix> {
        let catalog = self.catalog()?;
        if self.devices.is_empty() {
            Ok(catalog)
        } else {
            catalog.select(&self.devices)
        }
    }

    /// Runner configuration from the suite settings
    #[must_use]
    pub fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::new(&self.base_url)
            .with_screenshot_on_success(self.settings.screenshot_on_success);
        if let Some(ms) = self.settings.navigation_timeout_ms {
            config = config.with_navigation_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.settings.candidate_timeout_ms {
            config = config.with_candidate_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.settings.total_budget_ms {
            config = config.with_total_budget(Duration::from_millis(ms));
        }
        config
    }

    /// Scenario runner wired with this suite's login configuration
    #[must_use]
    pub fn scenario_runner(&self, config: RunnerConfig) -> ScenarioRunner {
        let auth = AuthSession::new(self.auth.clone(), &config.base_url)
            .with_navigation_timeout(config.navigation_timeout);
        ScenarioRunner::new(config, auth)
    }
}

fn validate_scenario(scenario: &Scenario) -> HarnessResult<()> {
    let empty = |what: String| {
        HarnessError::suite(format!(
            "scenario {:?}: {what} has no selectors",
            scenario.name
        ))
    };
    for step in &scenario.steps {
        if step.selectors().is_some_and(CandidateList::is_empty) {
            return Err(empty(step.describe()));
        }
        if let Step::Screenshot { name } = step {
            if name.trim().is_empty() {
                return Err(HarnessError::suite(format!(
                    "scenario {:?}: screenshot step without a name",
                    scenario.name
                )));
            }
        }
    }
    for check in &scenario.assertions {
        if check.selectors().is_some_and(CandidateList::is_empty) {
            return Err(empty(check.describe()));
        }
    }
    Ok(())
}

// ============================================================================
// Filtering
// ============================================================================

/// Narrows which scenarios and devices a run covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteFilter {
    /// Scenario name substring
    pub name: Option<String>,
    /// Scenario must carry at least one of these tags
    pub tags: Vec<String>,
    /// Device names replacing the suite's own list
    pub devices: Vec<String>,
}

impl SuiteFilter {
    /// Filter that keeps everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep scenarios whose name contains `name`
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Keep scenarios tagged `tag`
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Run on `device`
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.devices.push(device.into());
        self
    }

    /// Whether `scenario` is selected
    #[must_use]
    pub fn matches(&self, scenario: &Scenario) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .map_or(true, |needle| scenario.name.contains(needle));
        let tag_ok = self.tags.is_empty() || self.tags.iter().any(|t| scenario.tags.contains(t));
        name_ok && tag_ok
    }
}

// ============================================================================
// Suite runner
// ============================================================================

/// Progress callbacks for a suite run
pub trait SuiteObserver {
    /// Called once with the number of planned executions
    fn on_start(&mut self, _suite: &str, _total: usize) {}

    /// Called before a scenario runs on a device
    fn on_scenario_start(&mut self, _scenario: &Scenario, _device: &DeviceProfile) {}

    /// Called with each finished result
    fn on_scenario_end(&mut self, _result: &ScenarioResult) {}

    /// Called once with the complete report
    fn on_finish(&mut self, _report: &SuiteReport) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl SuiteObserver for SilentObserver {}

/// One planned execution
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRun<'a> {
    /// Scenario to run
    pub scenario: &'a Scenario,
    /// Device to size the context to
    pub device: DeviceProfile,
}

/// Runs a suite scenario by scenario
#[derive(Debug, Clone)]
pub struct SuiteRunner {
    suite: Suite,
    runner: ScenarioRunner,
    filter: SuiteFilter,
}

impl SuiteRunner {
    /// Runner for `suite`, executing scenarios through `runner`
    #[must_use]
    pub fn new(suite: Suite, runner: ScenarioRunner) -> Self {
        Self {
            suite,
            runner,
            filter: SuiteFilter::default(),
        }
    }

    /// Restrict the run
    #[must_use]
    pub fn with_filter(mut self, filter: SuiteFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The suite being run
    #[must_use]
    pub const fn suite(&self) -> &Suite {
        &self.suite
    }

    /// Selected scenarios x devices, scenario-major
    pub fn plan(&self) -> HarnessResult<Vec<PlannedRun<'_>>> {
        let matrix = if self.filter.devices.is_empty() {
            self.suite.matrix()?
        } else {
            self.suite.catalog()?.select(&self.filter.devices)?
        };

        Ok(self
            .suite
            .scenarios
            .iter()
            .filter(|s| self.filter.matches(s))
            .flat_map(|scenario| {
                matrix.profiles().map(move |device| PlannedRun {
                    scenario,
                    device: device.clone(),
                })
            })
            .collect())
    }

    /// Run every planned execution sequentially and write `report.json`
    /// under the output directory.
    ///
    /// Scenario failures are part of the report; errors are only returned
    /// for an invalid plan or an unwritable report.
    pub async fn run<F: ContextFactory>(
        &self,
        factory: &F,
        observer: &mut dyn SuiteObserver,
    ) -> HarnessResult<SuiteReport> {
        let plan = self.plan()?;
        let started = Instant::now();
        let mut report = SuiteReport::new(&self.suite.name);
        tracing::info!(
            suite = %self.suite.name,
            runs = plan.len(),
            run_id = %report.run_id,
            "starting suite"
        );
        observer.on_start(&self.suite.name, plan.len());

        for planned in &plan {
            observer.on_scenario_start(planned.scenario, &planned.device);
            let result = self.runner.run(factory, planned.scenario, &planned.device).await;
            observer.on_scenario_end(&result);
            report.results.push(result);
        }
        report.duration = started.elapsed();

        let output_dir = &self.runner.config().output_dir;
        std::fs::create_dir_all(output_dir)?;
        report.write_json(&output_dir.join("report.json"))?;
        tracing::info!(summary = %report.summary(), "suite finished");
        observer.on_finish(&report);
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::TimeoutPolicy;

    const SUITE: &str = r##"
version: "1"
name: crm-smoke
base_url: https://crm.example.test
auth:
  login_path: /login
  timeout_policy: assume_success
devices: [mobile-small, kiosk]
custom_devices:
  - { name: kiosk, width: 1080, height: 1920 }
settings:
  candidate_timeout_ms: 500
  total_budget_ms: 1200
scenarios:
  - name: admin-requests-table
    route: /admin/requests
    tags: [admin]
    steps:
      - { action: fill, selectors: ["#search"], value: "Smith" }
      - { action: click, selectors: ["button[type=submit]"], required: true }
      - { action: screenshot, name: after-search }
      - { action: reset_telemetry }
    assertions:
      - { check: visible, selectors: ["table", "[role=grid]"] }
      - { check: url_contains, text: "/admin/requests" }
      - { check: telemetry_absent, contains: ["not available"], excludes: ["✓"] }
  - name: contact-form
    route: /contact/sales
    tags: [public]
"##;

    mod load_tests {
        use super::*;

        #[test]
        fn test_parse_full_suite() {
            let suite = Suite::from_yaml(SUITE).unwrap();
            assert_eq!(suite.name, "crm-smoke");
            assert_eq!(suite.scenarios.len(), 2);
            assert_eq!(suite.auth.timeout_policy, TimeoutPolicy::AssumeSuccess);
            assert_eq!(suite.scenarios[0].steps.len(), 4);
            assert_eq!(suite.scenarios[0].assertions.len(), 3);
            assert_eq!(
                suite.runner_config().locator.timeout_per_candidate,
                Duration::from_millis(500)
            );
            assert_eq!(
                suite.runner_config().locator.total_budget,
                Some(Duration::from_millis(1_200))
            );
        }

        #[test]
        fn test_total_budget_defaults_to_none() {
            let yaml = SUITE.replace("  total_budget_ms: 1200\n", "");
            let suite = Suite::from_yaml(&yaml).unwrap();
            assert!(suite.runner_config().locator.total_budget.is_none());
        }

        #[test]
        fn test_matrix_includes_custom_device() {
            let suite = Suite::from_yaml(SUITE).unwrap();
            let names: Vec<_> = suite
                .matrix()
                .unwrap()
                .profiles()
                .map(|p| p.name.clone())
                .collect();
            assert_eq!(names, vec!["mobile-small", "kiosk"]);
        }

        #[test]
        fn test_rejects_wrong_version() {
            let yaml = SUITE.replace("version: \"1\"", "version: \"2\"");
            let err = Suite::from_yaml(&yaml).unwrap_err();
            assert!(matches!(err, HarnessError::Suite { .. }));
        }

        #[test]
        fn test_rejects_duplicate_names() {
            let yaml = SUITE.replace("name: contact-form", "name: admin-requests-table");
            let err = Suite::from_yaml(&yaml).unwrap_err();
            assert!(err.to_string().contains("duplicate"));
        }

        #[test]
        fn test_rejects_empty_selectors() {
            let yaml = SUITE.replace(r##"selectors: ["#search"]"##, "selectors: []");
            let err = Suite::from_yaml(&yaml).unwrap_err();
            assert!(err.to_string().contains("no selectors"));
        }

        #[test]
        fn test_rejects_unknown_device() {
            let yaml = SUITE.replace("[mobile-small, kiosk]", "[mobile-small, watch]");
            assert!(matches!(
                Suite::from_yaml(&yaml).unwrap_err(),
                HarnessError::UnknownDevice { .. }
            ));
        }

        #[test]
        fn test_rejects_zero_custom_dimension() {
            let yaml = SUITE.replace("width: 1080", "width: 0");
            assert!(Suite::from_yaml(&yaml).is_err());
        }

        #[test]
        fn test_malformed_yaml() {
            assert!(matches!(
                Suite::from_yaml("version: [").unwrap_err(),
                HarnessError::Yaml(_)
            ));
        }
    }

    mod filter_tests {
        use super::*;

        fn runner(filter: SuiteFilter) -> SuiteRunner {
            let suite = Suite::from_yaml(SUITE).unwrap();
            let scenario_runner = suite.scenario_runner(suite.runner_config());
            SuiteRunner::new(suite, scenario_runner).with_filter(filter)
        }

        #[test]
        fn test_plan_is_scenario_major() {
            let runner = runner(SuiteFilter::new());
            let plan: Vec<_> = runner
                .plan()
                .unwrap()
                .into_iter()
                .map(|p| format!("{}@{}", p.scenario.name, p.device.name))
                .collect();
            assert_eq!(
                plan,
                vec![
                    "admin-requests-table@mobile-small",
                    "admin-requests-table@kiosk",
                    "contact-form@mobile-small",
                    "contact-form@kiosk"
                ]
            );
        }

        #[test]
        fn test_filter_by_name_and_tag() {
            assert_eq!(runner(SuiteFilter::new().with_name("contact")).plan().unwrap().len(), 2);
            assert_eq!(runner(SuiteFilter::new().with_tag("admin")).plan().unwrap().len(), 2);
            assert!(runner(SuiteFilter::new().with_tag("billing")).plan().unwrap().is_empty());
        }

        #[test]
        fn test_filter_devices_override_suite_list() {
            let runner = runner(SuiteFilter::new().with_device("desktop-large"));
            let plan = runner.plan().unwrap();
            assert_eq!(plan.len(), 2);
            assert!(plan.iter().all(|p| p.device.name == "desktop-large"));
        }

        #[test]
        fn test_filter_unknown_device() {
            assert!(runner(SuiteFilter::new().with_device("watch")).plan().is_err());
        }
    }
}
