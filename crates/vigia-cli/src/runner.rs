//! Suite execution for the CLI

use crate::commands::{RunArgs, SelectionArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use std::path::Path;
use std::time::Duration;
use vigia::{
    Credentials, DeviceMatrix, Suite, SuiteReport, SuiteRunner, IDENTIFIER_ENV, SECRET_ENV,
};

/// Login credentials from `--identifier`/`--secret` or their environment
/// variables; both or neither must be given
pub fn credentials(
    identifier: Option<&str>,
    secret: Option<&str>,
) -> CliResult<Option<Credentials>> {
    match (identifier, secret) {
        (Some(identifier), Some(secret)) => Ok(Some(Credentials::new(identifier, secret))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(CliError::invalid_argument(format!(
            "--identifier given without --secret (or {SECRET_ENV})"
        ))),
        (None, Some(_)) => Err(CliError::invalid_argument(format!(
            "--secret given without --identifier (or {IDENTIFIER_ENV})"
        ))),
    }
}

/// Runs suites against Chromium
#[derive(Debug)]
pub struct SuiteExecutor {
    config: CliConfig,
    reporter: ProgressReporter,
}

impl SuiteExecutor {
    /// Create a new executor
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Self { config, reporter }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Load the suite, apply flag overrides and build the suite runner
    pub fn prepare(&self, args: &RunArgs) -> CliResult<SuiteRunner> {
        let mut suite = Suite::load(&args.suite)?;
        if let Some(ref base_url) = args.base_url {
            suite.base_url.clone_from(base_url);
        }

        let mut runner_config = suite
            .runner_config()
            .with_output_dir(&self.config.output_dir)
            .with_screenshot_on_success(
                suite.settings.screenshot_on_success || args.screenshot_on_success,
            );
        if let Some(ms) = args.navigation_timeout {
            runner_config = runner_config.with_navigation_timeout(Duration::from_millis(ms));
        }

        let mut scenario_runner = suite.scenario_runner(runner_config);
        if let Some(creds) = credentials(args.identifier.as_deref(), args.secret.as_deref())? {
            scenario_runner = scenario_runner.with_credentials(creds);
        }

        let runner =
            SuiteRunner::new(suite, scenario_runner).with_filter(args.selection.to_filter());
        if runner.plan()?.is_empty() {
            return Err(CliError::invalid_argument("no scenario matches the selection"));
        }
        Ok(runner)
    }

    /// Run the suite in Chromium, reporting progress on stderr
    pub async fn execute(&mut self, args: &RunArgs) -> CliResult<SuiteReport> {
        let runner = self.prepare(args)?;
        self.launch_and_run(&runner).await
    }

    #[cfg(feature = "browser")]
    async fn launch_and_run(&mut self, runner: &SuiteRunner) -> CliResult<SuiteReport> {
        let browser = vigia::CdpBrowser::launch(self.config.browser_config()).await?;
        let outcome = runner.run(&browser, &mut self.reporter).await;
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "closing browser failed");
        }
        outcome.map_err(CliError::from)
    }

    #[cfg(not(feature = "browser"))]
    async fn launch_and_run(&mut self, _runner: &SuiteRunner) -> CliResult<SuiteReport> {
        Err(CliError::config(
            "vigia was built without the `browser` feature; rebuild with --features browser",
        ))
    }
}

/// One line per planned scenario x device run
pub fn list_runs(path: &Path, selection: &SelectionArgs) -> CliResult<Vec<String>> {
    let suite = Suite::load(path)?;
    let scenario_runner = suite.scenario_runner(suite.runner_config());
    let runner = SuiteRunner::new(suite, scenario_runner).with_filter(selection.to_filter());
    Ok(runner
        .plan()?
        .iter()
        .map(|run| {
            let tags = if run.scenario.tags.is_empty() {
                String::new()
            } else {
                format!("  [{}]", run.scenario.tags.join(", "))
            };
            format!("{} @ {}  {}{tags}", run.scenario.name, run.device.name, run.scenario.route)
        })
        .collect())
}

/// Table of the device catalog, including a suite's custom devices
pub fn device_lines(suite: Option<&Path>) -> CliResult<Vec<String>> {
    let matrix = match suite {
        Some(path) => Suite::load(path)?.catalog()?,
        None => DeviceMatrix::standard(),
    };
    Ok(matrix
        .profiles()
        .map(|p| {
            let viewport = p.viewport();
            format!(
                "{:<18} {:>10}  x{:<4} {:<8} {}",
                p.name,
                viewport.to_string(),
                p.device_scale_factor,
                if p.mobile { "mobile" } else { "desktop" },
                if viewport.is_landscape() { "landscape" } else { "portrait" }
            )
        })
        .collect())
}
