//! Vigia: scenario harness for browser-driven end-to-end checks
//!
//! Vigia (Spanish: "watch, vigil") runs declarative scenarios against a web
//! application across a matrix of device profiles, logging in when a route
//! turns out to be protected and watching console and network traffic while
//! it acts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     VIGIA Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Suite      │    │ Scenario   │    │ Browsing   │            │
//! │   │ (YAML)     │───►│ Runner     │───►│ Context    │            │
//! │   │            │    │            │    │ (cdp/mock) │            │
//! │   └────────────┘    └─────┬──────┘    └─────┬──────┘            │
//! │                           │                 │ signals           │
//! │          ┌────────────────┼───────────┐     ▼                   │
//! │          ▼                ▼           ▼  ┌────────────┐         │
//! │   ┌────────────┐  ┌────────────┐ ┌─────┐ │ Telemetry  │         │
//! │   │ Device     │  │ Auth       │ │ Loc │ │ Collector  │         │
//! │   │ Matrix     │  │ Session    │ │ ator│ │            │         │
//! │   └────────────┘  └────────────┘ └─────┘ └────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use vigia::{mock::MockFactory, SilentObserver, Suite, SuiteRunner};
//!
//! let suite = Suite::load("suite.yaml".as_ref())?;
//! let runner = suite.scenario_runner(suite.runner_config());
//! let report = SuiteRunner::new(suite, runner)
//!     .run(&MockFactory::new(site), &mut SilentObserver)
//!     .await?;
//! println!("{}", report.render_text());
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod assertion;
mod auth;
mod browser;
mod device;
mod locator;
mod reporter;
mod result;
mod scenario;
mod suite;
mod telemetry;

/// Browsing context seam: the trait every driver implements
pub mod context;

/// In-memory driver for tests and dry runs
pub mod mock;

/// Condition polling with explicit budgets
pub mod wait;

pub use assertion::{Check, FailureEntry, SoftAssertions};
pub use auth::{
    AuthConfig, AuthSession, AuthenticatedContext, CompletionSignal, Credentials, TimeoutPolicy,
    IDENTIFIER_ENV, MAX_SETTLE_MS, SECRET_ENV,
};
pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{CdpBrowser, CdpContext};
pub use context::{
    BrowsingContext, BrowsingSession, ConsoleLevel, ContextFactory, ElementHandle, PageSignal,
    Probe,
};
pub use device::{DeviceMatrix, DeviceProfile, Viewport};
pub use locator::{
    CandidateAttempt, CandidateList, CandidateOutcome, LocatorOptions, ResilientLocator, Resolved,
    DEFAULT_CANDIDATE_TIMEOUT_MS,
};
pub use reporter::{ResultRecorder, ScenarioResult, SuiteReport};
pub use result::{HarnessError, HarnessResult};
pub use scenario::{
    RunnerConfig, Scenario, ScenarioPhase, ScenarioRunner, Step, DEFAULT_NAVIGATION_TIMEOUT_MS,
};
pub use suite::{
    PlannedRun, RunSettings, SilentObserver, Suite, SuiteFilter, SuiteObserver, SuiteRunner,
    SUITE_VERSION,
};
pub use telemetry::{
    AttachHandle, RecordPredicate, TelemetryCategory, TelemetryCollector, TelemetryRecord,
    TelemetrySummary, TextMatcher,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::assertion::*;
    pub use super::auth::*;
    pub use super::browser::*;
    pub use super::context::*;
    pub use super::device::*;
    pub use super::locator::*;
    pub use super::reporter::*;
    pub use super::result::*;
    pub use super::scenario::*;
    pub use super::suite::*;
    pub use super::telemetry::*;
}
