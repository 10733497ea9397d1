//! Vigia CLI: run browser scenario suites across device matrices
//!
//! ## Usage
//!
//! ```bash
//! vigia run suite.yaml                         # Every scenario on every device
//! vigia run suite.yaml --tag admin -d mobile-small
//! vigia list suite.yaml --filter contact       # Planned runs, no browser
//! vigia validate suite.yaml
//! vigia devices
//! ```

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vigia::{Suite, SuiteReport};
use vigia_cli::{
    device_lines, list_runs, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands,
    ReportFormat, RunArgs, SuiteExecutor, Verbosity,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: Verbosity) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();
    let mut config = CliConfig::new().with_verbosity(verbosity).with_color(color);
    if let Commands::Run(ref args) = cli.command {
        config = config
            .with_output_dir(&args.output)
            .with_headless(!args.headed)
            .with_no_sandbox(args.no_sandbox)
            .with_chromium_path(args.chromium_path.clone());
    }
    config
}

fn run(cli: Cli, config: CliConfig) -> CliResult<()> {
    match cli.command {
        Commands::Run(args) => run_suite(config, &args),
        Commands::List(args) => {
            for line in list_runs(&args.suite, &args.selection)? {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Devices(args) => {
            for line in device_lines(args.suite.as_deref())? {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Validate(args) => {
            let suite = Suite::load(&args.suite)?;
            println!(
                "{}: {} scenarios, {} devices OK",
                suite.name,
                suite.scenarios.len(),
                suite.matrix()?.len()
            );
            Ok(())
        }
    }
}

fn run_suite(config: CliConfig, args: &RunArgs) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let mut executor = SuiteExecutor::new(config);
    let report = runtime.block_on(executor.execute(args))?;
    print_report(&report, args)?;

    if report.all_passed() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: report.failed_count(),
            total: report.results.len(),
        })
    }
}

fn print_report(report: &SuiteReport, args: &RunArgs) -> CliResult<()> {
    match args.format {
        ReportFormat::Text => print!("{}", report.render_text()),
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(report).map_err(vigia::HarnessError::from)?
        ),
    }
    if let Some(ref path) = args.junit {
        report.write_junit(path)?;
        tracing::info!(path = %path.display(), "wrote JUnit report");
    }
    Ok(())
}
