//! Scenario execution: navigate, authenticate if needed, act, assert, report.
//!
//! ```text
//! Pending -> Navigating -> (Authenticating)? -> Acting -> Asserting
//!         -> Reporting -> Passed | Failed
//! ```
//!
//! A scenario owns one browsing session and one telemetry collector for one
//! device profile. Reporting always runs, even when a step panics, and the
//! session is closed on every path.

use crate::assertion::{Check, FailureEntry};
use crate::auth::{AuthSession, Credentials};
use crate::context::{join_url, BrowsingContext, BrowsingSession, ContextFactory};
use crate::device::DeviceProfile;
use crate::locator::{CandidateList, LocatorOptions, ResilientLocator};
use crate::reporter::{ResultRecorder, ScenarioResult};
use crate::result::{HarnessError, HarnessResult};
use crate::telemetry::{AttachHandle, TelemetryCollector, TelemetrySummary};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Instrument;

/// Default navigation budget (30 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Scenario lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPhase {
    /// Not started
    Pending,
    /// Sizing the context and loading the route
    Navigating,
    /// Logging in after landing on the login route
    Authenticating,
    /// Running steps
    Acting,
    /// Evaluating checks
    Asserting,
    /// Capturing evidence
    Reporting,
    /// Finished without failures
    Passed,
    /// Finished with failures
    Failed,
}

impl std::fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Navigating => "navigating",
            Self::Authenticating => "authenticating",
            Self::Acting => "acting",
            Self::Asserting => "asserting",
            Self::Reporting => "reporting",
            Self::Passed => "passed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One action against the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Load another route
    Goto {
        /// Route relative to the base URL, or an absolute URL
        route: String,
    },
    /// Type into an input
    Fill {
        /// Candidate selectors
        selectors: CandidateList,
        /// Text to type
        value: String,
        /// Abort the scenario if this step fails
        #[serde(default)]
        required: bool,
    },
    /// Click an element
    Click {
        /// Candidate selectors
        selectors: CandidateList,
        /// Abort the scenario if this step fails
        #[serde(default)]
        required: bool,
    },
    /// Wait until an element is visible
    WaitFor {
        /// Candidate selectors
        selectors: CandidateList,
        /// Per-candidate budget overriding the runner's
        #[serde(default)]
        timeout_ms: Option<u64>,
        /// Abort the scenario if this step fails
        #[serde(default)]
        required: bool,
    },
    /// Save a named screenshot
    Screenshot {
        /// File stem
        name: String,
    },
    /// Drop telemetry collected so far
    ResetTelemetry,
}

impl Step {
    /// Whether a failure aborts the scenario
    #[must_use]
    pub const fn is_required(&self) -> bool {
        match self {
            Self::Fill { required, .. }
            | Self::Click { required, .. }
            | Self::WaitFor { required, .. } => *required,
            Self::Goto { .. } => true,
            Self::Screenshot { .. } | Self::ResetTelemetry => false,
        }
    }

    /// Candidate selectors used by this step
    #[must_use]
    pub const fn selectors(&self) -> Option<&CandidateList> {
        match self {
            Self::Fill { selectors, .. }
            | Self::Click { selectors, .. }
            | Self::WaitFor { selectors, .. } => Some(selectors),
            _ => None,
        }
    }

    /// Short description for reports; never includes typed values
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Goto { route } => format!("goto {route}"),
            Self::Fill { selectors, .. } => format!("fill {selectors}"),
            Self::Click { selectors, .. } => format!("click {selectors}"),
            Self::WaitFor { selectors, .. } => format!("wait_for {selectors}"),
            Self::Screenshot { name } => format!("screenshot {name}"),
            Self::ResetTelemetry => "reset_telemetry".to_string(),
        }
    }
}

/// A named route with steps and checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name
    pub name: String,
    /// Target route
    pub route: String,
    /// Free-form tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,
    /// Actions, in order
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Checks, all evaluated
    #[serde(default)]
    pub assertions: Vec<Check>,
}

impl Scenario {
    /// Scenario visiting `route` with no steps or checks
    #[must_use]
    pub fn new(name: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            route: route.into(),
            tags: Vec::new(),
            steps: Vec::new(),
            assertions: Vec::new(),
        }
    }

    /// Add a step
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Add a check
    #[must_use]
    pub fn with_check(mut self, check: Check) -> Self {
        self.assertions.push(check);
        self
    }

    /// Add a tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Runner timeouts, evidence policy and output location
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Application base URL
    pub base_url: String,
    /// Budget for each navigation
    pub navigation_timeout: Duration,
    /// Element resolution options
    pub locator: LocatorOptions,
    /// Also screenshot passing scenarios
    pub screenshot_on_success: bool,
    /// Root of the artifact tree
    pub output_dir: PathBuf,
}

impl RunnerConfig {
    /// Defaults for `base_url`, writing artifacts under `./vigia-output`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            navigation_timeout: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
            locator: LocatorOptions::default(),
            screenshot_on_success: false,
            output_dir: PathBuf::from("vigia-output"),
        }
    }

    /// Set the navigation budget
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Set the per-candidate budget
    #[must_use]
    pub const fn with_candidate_timeout(mut self, timeout: Duration) -> Self {
        self.locator.timeout_per_candidate = timeout;
        self
    }

    /// Cap each element resolution across all its candidates
    #[must_use]
    pub const fn with_total_budget(mut self, budget: Duration) -> Self {
        self.locator.total_budget = Some(budget);
        self
    }

    /// Set the artifact root
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Screenshot passing scenarios too
    #[must_use]
    pub const fn with_screenshot_on_success(mut self, enabled: bool) -> Self {
        self.screenshot_on_success = enabled;
        self
    }

    /// Artifact directory for one scenario on one device
    #[must_use]
    pub fn artifact_dir(&self, scenario: &str, device: &str) -> PathBuf {
        self.output_dir
            .join(path_component(scenario))
            .join(path_component(device))
    }
}

/// Replace anything but ASCII alphanumerics, `-` and `_`
fn path_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// State owned by one scenario execution
struct Run<C> {
    session: BrowsingSession<C>,
    telemetry: TelemetryCollector,
    recorder: ResultRecorder,
    artifact_dir: PathBuf,
}

/// Executes scenarios against contexts from a [`ContextFactory`]
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    config: RunnerConfig,
    auth: AuthSession,
    credentials: Option<Credentials>,
}

impl ScenarioRunner {
    /// Runner with the given login wiring and no credentials
    #[must_use]
    pub fn new(config: RunnerConfig, auth: AuthSession) -> Self {
        Self {
            config,
            auth,
            credentials: None,
        }
    }

    /// Log in with these credentials when a scenario lands on the login route
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// The runner configuration
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `scenario` on `profile`.
    ///
    /// Never fails: every error, including a panic while acting, ends up as
    /// a failure entry of the returned result.
    pub async fn run<F: ContextFactory>(
        &self,
        factory: &F,
        scenario: &Scenario,
        profile: &DeviceProfile,
    ) -> ScenarioResult {
        let span = tracing::info_span!("scenario", name = %scenario.name, device = %profile.name);
        self.run_inner(factory, scenario, profile).instrument(span).await
    }

    async fn run_inner<F: ContextFactory>(
        &self,
        factory: &F,
        scenario: &Scenario,
        profile: &DeviceProfile,
    ) -> ScenarioResult {
        let mut recorder = ResultRecorder::new(&scenario.name, &profile.name);
        let context = match factory.open(profile).await {
            Ok(context) => context,
            Err(e) => {
                tracing::error!(error = %e, "could not open browsing context");
                recorder.fail(FailureEntry::from_error(
                    ScenarioPhase::Pending,
                    "open browsing context",
                    &e,
                ));
                recorder.enter(ScenarioPhase::Reporting);
                return recorder.finalize(TelemetrySummary::default());
            }
        };

        let mut run = Run {
            session: BrowsingSession::new(context),
            telemetry: TelemetryCollector::new(),
            recorder,
            artifact_dir: self.config.artifact_dir(&scenario.name, &profile.name),
        };
        let handle = match run.telemetry.attach(run.session.context()).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                run.recorder.fail(FailureEntry::from_error(
                    ScenarioPhase::Pending,
                    "attach telemetry",
                    &e,
                ));
                None
            }
        };

        if run.recorder.all_passed() {
            let outcome = AssertUnwindSafe(self.drive(&mut run, scenario, profile))
                .catch_unwind()
                .await;
            if let Err(panic) = outcome {
                let message = panic_message(panic.as_ref());
                tracing::error!(%message, "scenario panicked");
                let phase = run.recorder.phase();
                run.recorder.fail(FailureEntry::new(
                    phase,
                    "scenario execution",
                    format!("panicked: {message}"),
                ));
            }
        }

        run.recorder.enter(ScenarioPhase::Reporting);
        self.report(&mut run, handle).await;
        if let Err(e) = run.session.close().await {
            tracing::warn!(error = %e, "closing browsing context failed");
        }
        let summary = run.telemetry.summary();
        run.recorder.finalize(summary)
    }

    async fn drive<C: BrowsingContext>(
        &self,
        run: &mut Run<C>,
        scenario: &Scenario,
        profile: &DeviceProfile,
    ) {
        run.recorder.enter(ScenarioPhase::Navigating);
        if let Err(e) = profile.apply(run.session.context_mut()).await {
            run.recorder.fail(FailureEntry::from_error(
                ScenarioPhase::Navigating,
                format!("apply device {}", profile.name),
                &e,
            ));
            return;
        }

        let target = join_url(&self.config.base_url, &scenario.route);
        if let Err(e) = self.navigate(run, &target).await {
            run.recorder.fail(FailureEntry::from_error(
                ScenarioPhase::Navigating,
                format!("goto {target}"),
                &e,
            ));
            return;
        }

        if let Err(e) = self.authenticate_if_needed(run, &target).await {
            run.recorder.fail(FailureEntry::from_error(
                ScenarioPhase::Authenticating,
                "login",
                &e,
            ));
            return;
        }

        run.recorder.enter(ScenarioPhase::Acting);
        let locator = ResilientLocator::with_options(self.config.locator);
        for step in &scenario.steps {
            tracing::debug!(step = %step.describe(), "acting");
            if let Err(e) = self.perform(run, step, &locator).await {
                let mut entry =
                    FailureEntry::from_error(ScenarioPhase::Acting, step.describe(), &e);
                if entry.selectors.is_empty() {
                    if let Some(selectors) = step.selectors() {
                        entry = entry.with_selectors(selectors);
                    }
                }
                run.recorder.fail(entry);
                if step.is_required() || e.aborts_scenario() {
                    tracing::warn!(
                        step = %step.describe(),
                        "step failed, skipping the rest of the scenario"
                    );
                    return;
                }
            }
        }

        run.recorder.enter(ScenarioPhase::Asserting);
        for check in &scenario.assertions {
            if let Some(failure) = check
                .evaluate(run.session.context(), &mut run.telemetry, &locator)
                .await
            {
                run.recorder.fail(failure);
            }
        }
    }

    async fn navigate<C: BrowsingContext>(&self, run: &mut Run<C>, url: &str) -> HarnessResult<()> {
        run.session
            .context_mut()
            .goto(url, self.config.navigation_timeout)
            .await
    }

    async fn authenticate_if_needed<C: BrowsingContext>(
        &self,
        run: &mut Run<C>,
        target: &str,
    ) -> HarnessResult<()> {
        let landed = run.session.context().current_url().await?;
        if !self.auth.is_login_route(&landed) || self.auth.is_login_route(target) {
            return Ok(());
        }
        run.recorder.enter(ScenarioPhase::Authenticating);
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| {
                HarnessError::browser(format!(
                    "redirected to login at {landed} but no credentials are configured"
                ))
            })?;
        let auth = self.auth.login(&mut run.session, credentials).await?;
        run.recorder.authenticated(auth);
        self.navigate(run, target).await
    }

    async fn perform<C: BrowsingContext>(
        &self,
        run: &mut Run<C>,
        step: &Step,
        locator: &ResilientLocator,
    ) -> HarnessResult<()> {
        match step {
            Step::Goto { route } => {
                let url = join_url(&self.config.base_url, route);
                self.navigate(run, &url).await
            }
            Step::Fill { selectors, value, .. } => {
                let ctx = run.session.context();
                let resolved = locator.resolve(ctx, selectors).await?;
                ctx.fill(&resolved.element, value).await
            }
            Step::Click { selectors, .. } => {
                let ctx = run.session.context();
                let resolved = locator.resolve(ctx, selectors).await?;
                ctx.click(&resolved.element).await
            }
            Step::WaitFor {
                selectors,
                timeout_ms,
                ..
            } => {
                let locator = timeout_ms
                    .map_or(*locator, |ms| locator.with_timeout(Duration::from_millis(ms)));
                locator.resolve(run.session.context(), selectors).await.map(|_| ())
            }
            Step::Screenshot { name } => {
                let bytes = run.session.context().screenshot().await?;
                let file_name = format!("{}.png", path_component(name));
                let path = write_artifact(&run.artifact_dir, &file_name, &bytes).await?;
                run.recorder.add_artifact(path);
                Ok(())
            }
            Step::ResetTelemetry => {
                run.telemetry.reset();
                Ok(())
            }
        }
    }

    async fn report<C: BrowsingContext>(&self, run: &mut Run<C>, handle: Option<AttachHandle>) {
        if !run.recorder.all_passed() || self.config.screenshot_on_success {
            match run.session.context().screenshot().await {
                Ok(bytes) => match write_artifact(&run.artifact_dir, "final.png", &bytes).await {
                    Ok(path) => run.recorder.add_artifact(path),
                    Err(e) => tracing::warn!(error = %e, "could not save final screenshot"),
                },
                Err(e) => tracing::warn!(error = %e, "could not capture final screenshot"),
            }
        }

        if let Some(handle) = handle {
            run.telemetry.detach(handle);
        }
        let log = run.artifact_dir.join("telemetry.jsonl");
        let written = std::fs::create_dir_all(&run.artifact_dir)
            .map_err(HarnessError::from)
            .and_then(|()| run.telemetry.write_jsonl(&log));
        match written {
            Ok(()) => run.recorder.add_artifact(log),
            Err(e) => tracing::warn!(error = %e, "could not write telemetry log"),
        }
    }
}

async fn write_artifact(dir: &Path, file_name: &str, bytes: &[u8]) -> HarnessResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use crate::mock::{ClickReaction, MockContext, MockElement, MockFactory, MockPage};

    fn runner(dir: &Path) -> ScenarioRunner {
        let config = RunnerConfig::new("https://app.test")
            .with_output_dir(dir)
            .with_candidate_timeout(Duration::from_millis(200));
        ScenarioRunner::new(config, AuthSession::new(AuthConfig::default(), "https://app.test"))
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ScenarioPhase::Authenticating.to_string(), "authenticating");
    }

    #[test]
    fn test_step_yaml() {
        let steps: Vec<Step> = serde_yaml_ng::from_str(
            r##"
- { action: fill, selectors: ["#search"], value: "Smith" }
- { action: click, selectors: ["button[type=submit]"], required: true }
- { action: reset_telemetry }
- { action: wait_for, selectors: ["table"], timeout_ms: 5000 }
"##,
        )
        .unwrap();
        assert!(!steps[0].is_required());
        assert!(steps[1].is_required());
        assert_eq!(steps[2], Step::ResetTelemetry);
        assert_eq!(steps[0].describe(), "fill [#search]");
    }

    #[test]
    fn test_artifact_dir_sanitized() {
        let config = RunnerConfig::new("https://app.test").with_output_dir("out");
        assert_eq!(
            config.artifact_dir("contact form/buy", "mobile-small"),
            PathBuf::from("out").join("contact_form_buy").join("mobile-small")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_continues_unless_required() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockContext::new()
            .with_page(MockPage::new("/contact").with_element(MockElement::new("#name")));
        let factory = MockFactory::new(site);
        let scenario = Scenario::new("contact", "/contact")
            .with_step(Step::Click {
                selectors: CandidateList::single("#missing"),
                required: false,
            })
            .with_step(Step::Fill {
                selectors: CandidateList::single("#name"),
                value: "Ada".into(),
                required: false,
            });
        let result = runner(dir.path())
            .run(&factory, &scenario, &DeviceProfile::new("d", 800, 600))
            .await;
        assert!(!result.passed);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].selectors, vec!["#missing"]);
        assert_eq!(factory.opened()[0].value_of("#name"), "Ada");
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_step_still_reports_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockContext::new().with_element(
            MockElement::new("#boom").on_click(ClickReaction::Panic("driver crashed".into())),
        );
        let factory = MockFactory::new(site);
        let scenario = Scenario::new("crash", "/").with_step(Step::Click {
            selectors: CandidateList::single("#boom"),
            required: false,
        });
        let result = runner(dir.path())
            .run(&factory, &scenario, &DeviceProfile::new("d", 800, 600))
            .await;
        assert!(!result.passed);
        assert!(result.failures[0].message.contains("driver crashed"));
        assert!(factory.opened()[0].is_closed());
        assert!(result.artifacts.iter().any(|p| p.ends_with("final.png")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_required_step_skips_rest_of_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockContext::new()
            .with_page(MockPage::new("/contact").with_element(MockElement::new("#name")));
        let factory = MockFactory::new(site);
        let scenario = Scenario::new("contact", "/contact")
            .with_step(Step::Click {
                selectors: CandidateList::single("#missing"),
                required: true,
            })
            .with_step(Step::Fill {
                selectors: CandidateList::single("#name"),
                value: "Ada".into(),
                required: false,
            })
            .with_check(Check::Visible {
                selectors: CandidateList::single("#absent"),
            });
        let result = runner(dir.path())
            .run(&factory, &scenario, &DeviceProfile::new("d", 800, 600))
            .await;

        assert!(!result.passed);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].phase, ScenarioPhase::Acting);
        assert_eq!(result.reached, ScenarioPhase::Acting);
        let ctx = &factory.opened()[0];
        assert_eq!(ctx.value_of("#name"), "");
        assert_eq!(ctx.close_count(), 1);
        assert!(result.artifacts.iter().any(|p| p.ends_with("final.png")));
        assert!(result.artifacts.iter().any(|p| p.ends_with("telemetry.jsonl")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_screenshot_step_saves_named_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockContext::new()
            .with_page(MockPage::new("/admin/requests").with_element(MockElement::new("table")));
        let factory = MockFactory::new(site);
        let scenario = Scenario::new("requests", "/admin/requests")
            .with_step(Step::Screenshot {
                name: "after search".into(),
            })
            .with_check(Check::Visible {
                selectors: CandidateList::single("table"),
            });
        let result = runner(dir.path())
            .run(&factory, &scenario, &DeviceProfile::new("d", 800, 600))
            .await;

        assert!(result.passed);
        assert_eq!(result.reached, ScenarioPhase::Asserting);
        let shot = result
            .artifacts
            .iter()
            .find(|p| p.ends_with("after_search.png"))
            .expect("named screenshot recorded");
        assert!(std::fs::read(shot).unwrap().starts_with(b"\x89PNG"));
        assert!(!result.artifacts.iter().any(|p| p.ends_with("final.png")));
        assert_eq!(factory.opened()[0].screenshot_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_redirect_without_credentials_fails_authenticating() {
        let dir = tempfile::tempdir().unwrap();
        let site = MockContext::new()
            .with_protected("/admin")
            .with_page(MockPage::new("/login").with_element(MockElement::new("#email")))
            .with_page(MockPage::new("/admin").with_element(MockElement::new("nav.sidebar")));
        let factory = MockFactory::new(site);
        let scenario = Scenario::new("admin", "/admin").with_check(Check::Visible {
            selectors: CandidateList::single("nav.sidebar"),
        });
        let result = runner(dir.path())
            .run(&factory, &scenario, &DeviceProfile::new("d", 800, 600))
            .await;

        assert!(!result.passed);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].phase, ScenarioPhase::Authenticating);
        assert!(result.failures[0].message.contains("no credentials"));
        assert_eq!(result.reached, ScenarioPhase::Authenticating);
        assert!(result.authenticated.is_none());
        assert_eq!(factory.opened()[0].visits(), vec!["/login"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_open_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MockFactory::new(MockContext::new()).failing();
        let result = runner(dir.path())
            .run(&factory, &Scenario::new("x", "/"), &DeviceProfile::new("d", 800, 600))
            .await;
        assert!(!result.passed);
        assert_eq!(result.failures[0].phase, ScenarioPhase::Pending);
    }
}
