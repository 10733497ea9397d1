//! Browsing contexts: the seam between the harness and a browser.
//!
//! A [`BrowsingContext`] is one isolated tab/profile owned by exactly one
//! scenario. The CDP driver (`browser` feature) and the in-memory mock both
//! implement it, so every harness component is written once against this
//! trait.

use crate::auth::AuthenticatedContext;
use crate::device::{DeviceProfile, Viewport};
use crate::result::HarnessResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Console message level as reported by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// console.log
    Log,
    /// console.debug
    Debug,
    /// console.info
    Info,
    /// console.warn
    Warning,
    /// console.error
    Error,
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Log => "log",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// A raw console or network signal emitted by a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageSignal {
    /// console.* call
    Console {
        /// Level of the call
        level: ConsoleLevel,
        /// Joined arguments
        text: String,
        /// When the page emitted it
        at: DateTime<Utc>,
    },
    /// Uncaught exception or unhandled rejection
    Exception {
        /// Exception description
        text: String,
        /// When the page emitted it
        at: DateTime<Utc>,
    },
    /// HTTP response received
    Response {
        /// Request method
        method: String,
        /// Response URL
        url: String,
        /// HTTP status
        status: u16,
        /// When the response arrived
        at: DateTime<Utc>,
    },
    /// Request failed before a response (DNS, abort, CORS...)
    RequestFailed {
        /// Request method
        method: String,
        /// Request URL
        url: String,
        /// Browser error text
        error: String,
        /// When the failure was reported
        at: DateTime<Utc>,
    },
}

impl PageSignal {
    /// Console signal stamped now
    #[must_use]
    pub fn console(level: ConsoleLevel, text: impl Into<String>) -> Self {
        Self::Console {
            level,
            text: text.into(),
            at: Utc::now(),
        }
    }

    /// Response signal stamped now
    #[must_use]
    pub fn response(method: impl Into<String>, url: impl Into<String>, status: u16) -> Self {
        Self::Response {
            method: method.into(),
            url: url.into(),
            status,
            at: Utc::now(),
        }
    }

    /// Request failure stamped now
    #[must_use]
    pub fn request_failed(
        method: impl Into<String>,
        url: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::RequestFailed {
            method: method.into(),
            url: url.into(),
            error: error.into(),
            at: Utc::now(),
        }
    }

    /// Exception signal stamped now
    #[must_use]
    pub fn exception(text: impl Into<String>) -> Self {
        Self::Exception {
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Receiving end of a context's signal stream
pub type SignalReceiver = mpsc::UnboundedReceiver<PageSignal>;

/// Reference to a visible element found by a selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Selector that found the element
    pub selector: String,
    /// Index among the selector's matches
    pub index: usize,
}

impl ElementHandle {
    /// Create a handle for the `index`-th match of `selector`
    #[must_use]
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }
}

/// Snapshot of what a selector matches right now
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Probe {
    /// Number of elements matched, visible or not
    pub matches: usize,
    /// First visible match, if any
    pub visible: Option<ElementHandle>,
}

impl Probe {
    /// Nothing matched
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            matches: 0,
            visible: None,
        }
    }
}

/// One isolated browsing context (tab + profile)
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    /// Navigate and wait for the load event, bounded by `timeout`
    async fn goto(&mut self, url: &str, timeout: Duration) -> HarnessResult<()>;

    /// Current location
    async fn current_url(&self) -> HarnessResult<String>;

    /// Override viewport metrics; replaces any previous override
    async fn set_viewport(
        &mut self,
        viewport: Viewport,
        device_scale_factor: f64,
        mobile: bool,
    ) -> HarnessResult<()>;

    /// Override the user agent
    async fn set_user_agent(&mut self, user_agent: &str) -> HarnessResult<()>;

    /// Viewport as reported by the page
    async fn viewport(&self) -> HarnessResult<Viewport>;

    /// Query a selector without waiting.
    ///
    /// Zero matches is not an error; only a malformed selector is
    /// (`HarnessError::SelectorSyntax`).
    async fn probe(&self, selector: &str) -> HarnessResult<Probe>;

    /// Replace the value of an input element by typing
    async fn fill(&self, element: &ElementHandle, value: &str) -> HarnessResult<()>;

    /// Click an element
    async fn click(&self, element: &ElementHandle) -> HarnessResult<()>;

    /// Rendered text of an element
    async fn text_of(&self, element: &ElementHandle) -> HarnessResult<String>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> HarnessResult<Vec<u8>>;

    /// Open a new stream of console/network signals
    async fn subscribe(&self) -> HarnessResult<SignalReceiver>;

    /// Release the context; further calls may fail
    async fn close(&mut self) -> HarnessResult<()>;
}

/// Creates one isolated context per scenario run
#[async_trait]
pub trait ContextFactory: Send + Sync {
    /// Context type produced
    type Context: BrowsingContext;

    /// Open a fresh context sized for `profile`
    async fn open(&self, profile: &DeviceProfile) -> HarnessResult<Self::Context>;
}

/// A context owned by one scenario run, plus its login state
#[derive(Debug)]
pub struct BrowsingSession<C> {
    context: C,
    auth: Option<AuthenticatedContext>,
    closed: bool,
}

impl<C: BrowsingContext> BrowsingSession<C> {
    /// Wrap a freshly opened context
    #[must_use]
    pub const fn new(context: C) -> Self {
        Self {
            context,
            auth: None,
            closed: false,
        }
    }

    /// The underlying context
    pub const fn context(&self) -> &C {
        &self.context
    }

    /// The underlying context, mutably
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Login record, if this session has authenticated
    pub const fn authenticated(&self) -> Option<&AuthenticatedContext> {
        self.auth.as_ref()
    }

    /// Whether a login has completed on this session
    pub const fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    pub(crate) fn set_authenticated(&mut self, auth: AuthenticatedContext) {
        self.auth = Some(auth);
    }

    /// Close the context once; later calls are no-ops
    pub async fn close(&mut self) -> HarnessResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.auth = None;
        self.context.close().await
    }
}

/// Path component of a URL (without query or fragment)
#[must_use]
pub fn route_path(url: &str) -> &str {
    let after_scheme = url.find("://").map_or(url, |i| &url[i + 3..]);
    let path = after_scheme
        .find('/')
        .map_or("/", |i| &after_scheme[i..]);
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

/// Join a base URL and a route, tolerating slashes on either side
#[must_use]
pub fn join_url(base: &str, route: &str) -> String {
    if route.contains("://") {
        return route.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        route.trim_start_matches('/')
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::MockContext;

    #[test]
    fn test_route_path() {
        assert_eq!(route_path("https://crm.test/login?next=/admin"), "/login");
        assert_eq!(route_path("https://crm.test"), "/");
        assert_eq!(
            route_path("http://localhost:3000/admin/requests/42#notes"),
            "/admin/requests/42",
        );
        assert_eq!(route_path("/contact/buy"), "/contact/buy");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://crm.test/", "/admin"), "https://crm.test/admin");
        assert_eq!(join_url("https://crm.test", "admin"), "https://crm.test/admin");
        assert_eq!(join_url("https://crm.test", "https://other.test/x"), "https://other.test/x");
    }

    #[test]
    fn test_console_level_display() {
        assert_eq!(ConsoleLevel::Warning.to_string(), "warning");
    }

    #[tokio::test]
    async fn test_session_close_is_idempotent() {
        let ctx = MockContext::new();
        let observer = ctx.clone();
        let mut session = BrowsingSession::new(ctx);
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(observer.is_closed());
        assert_eq!(observer.close_count(), 1);
    }
}
