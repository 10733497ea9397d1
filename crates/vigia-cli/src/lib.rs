//! Vigia CLI Library
//!
//! Command-line interface for the Vigia scenario harness: load a suite,
//! select scenarios and devices, run them in Chromium and report.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)] // String building is clear and correct
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, DevicesArgs, ListArgs, ReportFormat, RunArgs, SelectionArgs,
    ValidateArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
pub use runner::{credentials, device_lines, list_runs, SuiteExecutor};
