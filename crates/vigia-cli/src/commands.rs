//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vigia::SuiteFilter;

/// Vigia: run browser scenario suites across device matrices
#[derive(Parser, Debug)]
#[command(name = "vigia")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a suite in a real browser
    Run(RunArgs),

    /// List the scenario x device runs a suite would execute
    List(ListArgs),

    /// Show the device catalog
    Devices(DevicesArgs),

    /// Check a suite file without running it
    Validate(ValidateArgs),
}

/// Scenario and device selection shared by `run` and `list`
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Only scenarios whose name contains this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Only scenarios carrying this tag (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Run on this device instead of the suite's list (repeatable)
    #[arg(short, long = "device")]
    pub devices: Vec<String>,
}

impl SelectionArgs {
    /// Suite filter for these flags
    #[must_use]
    pub fn to_filter(&self) -> SuiteFilter {
        SuiteFilter {
            name: self.filter.clone(),
            tags: self.tags.clone(),
            devices: self.devices.clone(),
        }
    }
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Suite file (YAML)
    pub suite: PathBuf,

    /// Scenario and device selection
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Output directory for screenshots, telemetry logs and report.json
    #[arg(short, long, default_value = "vigia-output")]
    pub output: PathBuf,

    /// Override the suite's base URL
    #[arg(long, env = "VIGIA_BASE_URL")]
    pub base_url: Option<String>,

    /// Login identifier
    #[arg(long, env = "VIGIA_IDENTIFIER")]
    pub identifier: Option<String>,

    /// Login secret
    #[arg(long, env = "VIGIA_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Chromium binary (auto-detected when unset)
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Save a final screenshot for passing scenarios too
    #[arg(long)]
    pub screenshot_on_success: bool,

    /// Navigation timeout in milliseconds
    #[arg(long)]
    pub navigation_timeout: Option<u64>,

    /// Also write a JUnit XML report to this path
    #[arg(long)]
    pub junit: Option<PathBuf>,

    /// Report format printed to stdout
    #[arg(long, default_value = "text")]
    pub format: ReportFormat,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Suite file (YAML)
    pub suite: PathBuf,

    /// Scenario and device selection
    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// Arguments for the devices command
#[derive(Parser, Debug)]
pub struct DevicesArgs {
    /// Include the custom devices of this suite
    #[arg(long)]
    pub suite: Option<PathBuf>,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Suite file (YAML)
    pub suite: PathBuf,
}

/// Report format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable summary with every failure
    #[default]
    Text,
    /// The JSON report
    Json,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
