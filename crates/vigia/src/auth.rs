//! Credential-based login bootstrap.
//!
//! [`AuthSession::login`] drives the application's login form through the
//! [`ResilientLocator`], then waits for the first of three signals: the
//! location leaving the login route, a post-login landmark appearing, or an
//! error banner appearing that was not already showing before submit. Every
//! wait is bounded.

use crate::context::{join_url, route_path, BrowsingContext, BrowsingSession};
use crate::locator::{CandidateList, ResilientLocator};
use crate::result::{HarnessError, HarnessResult};
use crate::wait::{poll_until, wait_for_stable, WaitOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the login identifier
pub const IDENTIFIER_ENV: &str = "VIGIA_IDENTIFIER";

/// Environment variable holding the login secret
pub const SECRET_ENV: &str = "VIGIA_SECRET";

/// Upper bound for the post-login settle wait (5 seconds)
pub const MAX_SETTLE_MS: u64 = 5_000;

/// Login identifier and secret
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    identifier: String,
    secret: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    /// Login identifier
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Login secret
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// What to do when login neither completes nor is rejected in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Report `AuthenticationTimeout`
    #[default]
    Fail,
    /// Carry on as if the login worked
    AssumeSuccess,
}

/// Login form wiring and wait budgets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Login entry point, relative to the base URL
    pub login_path: String,
    /// Additional routes that count as "still on the login page"
    pub login_routes: Vec<String>,
    /// Candidates for the identifier input
    pub identifier_fields: CandidateList,
    /// Candidates for the secret input
    pub secret_fields: CandidateList,
    /// Candidates for the submit control
    pub submit: CandidateList,
    /// Elements that only exist once logged in
    pub landmarks: CandidateList,
    /// Elements showing a rejected login
    pub error_banners: CandidateList,
    /// Behavior when no signal arrives in time
    pub timeout_policy: TimeoutPolicy,
    /// Budget for a completion signal
    pub completion_timeout_ms: u64,
    /// Budget for the location to settle after login
    pub settle_max_ms: u64,
    /// How long the location must stay unchanged to count as settled
    pub settle_quiet_ms: u64,
    /// Per-candidate budget when locating form fields
    pub field_timeout_ms: u64,
    /// Polling interval for every login wait
    pub poll_interval_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            login_routes: Vec::new(),
            identifier_fields: CandidateList::new([
                "input[type=email]",
                "input[name=username]",
                "input[name=email]",
                "#email",
                "#username",
            ]),
            secret_fields: CandidateList::new([
                "input[type=password]",
                "input[name=password]",
                "#password",
            ]),
            submit: CandidateList::new([
                "button[type=submit]",
                "input[type=submit]",
                "form button",
            ]),
            landmarks: CandidateList::new([
                "[data-testid=admin-nav]",
                "nav.sidebar",
                "aside nav",
            ]),
            error_banners: CandidateList::new([
                "[role=alert]",
                ".alert-danger",
                ".error-message",
            ]),
            timeout_policy: TimeoutPolicy::Fail,
            completion_timeout_ms: 15_000,
            settle_max_ms: 3_000,
            settle_quiet_ms: 500,
            field_timeout_ms: 2_000,
            poll_interval_ms: 100,
        }
    }
}

impl AuthConfig {
    /// Set the timeout policy
    #[must_use]
    pub const fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Set the completion budget in milliseconds
    #[must_use]
    pub const fn with_completion_timeout(mut self, ms: u64) -> Self {
        self.completion_timeout_ms = ms;
        self
    }

    /// Replace the landmark candidates
    #[must_use]
    pub fn with_landmarks(mut self, landmarks: CandidateList) -> Self {
        self.landmarks = landmarks;
        self
    }

    /// Replace the error banner candidates
    #[must_use]
    pub fn with_error_banners(mut self, banners: CandidateList) -> Self {
        self.error_banners = banners;
        self
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Which signal ended the login wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionSignal {
    /// Location left every login route
    LeftLoginRoute,
    /// A post-login landmark became visible
    LandmarkPresent,
    /// Nothing happened; success assumed by policy
    TimedOut,
}

/// Record of a completed login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedContext {
    /// Identifier used
    pub identifier: String,
    /// Signal that completed the login
    pub signal: CompletionSignal,
    /// Location after settling
    pub landed_url: String,
    /// When the login completed
    pub authenticated_at: DateTime<Utc>,
}

/// Drives the login form of one application
#[derive(Debug, Clone)]
pub struct AuthSession {
    config: AuthConfig,
    base_url: String,
    navigation_timeout: Duration,
}

impl AuthSession {
    /// Login against `base_url`
    #[must_use]
    pub fn new(config: AuthConfig, base_url: impl Into<String>) -> Self {
        Self {
            config,
            base_url: base_url.into(),
            navigation_timeout: Duration::from_secs(30),
        }
    }

    /// Set the budget for loading the login page
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// The login configuration
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Whether `url` is on the login page (or one of the extra login routes)
    #[must_use]
    pub fn is_login_route(&self, url: &str) -> bool {
        let path = route_path(url);
        std::iter::once(&self.config.login_path)
            .chain(&self.config.login_routes)
            .map(|r| r.trim_end_matches('/'))
            .any(|r| {
                path.strip_prefix(r)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
    }

    /// Log in on `session` and attach the resulting context to it.
    ///
    /// # Errors
    ///
    /// `AlreadyAuthenticated` for a session that already logged in,
    /// `ElementNotFound` when a form field cannot be located,
    /// `AuthenticationRejected` when an error banner shows, and
    /// `AuthenticationTimeout` when nothing happens in time under
    /// [`TimeoutPolicy::Fail`].
    pub async fn login<C: BrowsingContext>(
        &self,
        session: &mut BrowsingSession<C>,
        credentials: &Credentials,
    ) -> HarnessResult<AuthenticatedContext> {
        if let Some(existing) = session.authenticated() {
            return Err(HarnessError::AlreadyAuthenticated {
                identifier: existing.identifier.clone(),
            });
        }

        let login_url = join_url(&self.base_url, &self.config.login_path);
        tracing::info!(url = %login_url, identifier = credentials.identifier(), "logging in");
        session
            .context_mut()
            .goto(&login_url, self.navigation_timeout)
            .await?;

        let ctx = session.context();
        let locator = ResilientLocator::new()
            .with_timeout(Duration::from_millis(self.config.field_timeout_ms))
            .with_poll_interval(self.config.poll_interval());

        let identifier = locator.resolve(ctx, &self.config.identifier_fields).await?;
        let secret = locator.resolve(ctx, &self.config.secret_fields).await?;
        ctx.fill(&identifier.element, credentials.identifier()).await?;
        ctx.fill(&secret.element, credentials.secret()).await?;
        let submit = locator.resolve(ctx, &self.config.submit).await?;
        let standing = self.visible_banners(ctx).await?;
        if !standing.is_empty() {
            tracing::debug!(?standing, "banners visible before submit");
        }
        ctx.click(&submit.element).await?;

        let signal = self.await_completion(ctx, &standing).await?;
        tracing::info!(?signal, "login completed");

        let settle_max = Duration::from_millis(self.config.settle_max_ms.min(MAX_SETTLE_MS));
        let settled = wait_for_stable(
            settle_max,
            Duration::from_millis(self.config.settle_quiet_ms),
            self.config.poll_interval(),
            || ctx.current_url(),
        )
        .await?;
        if !settled.success {
            tracing::debug!(elapsed = ?settled.elapsed, "location still changing after login");
        }

        let auth = AuthenticatedContext {
            identifier: credentials.identifier().to_string(),
            signal,
            landed_url: ctx.current_url().await?,
            authenticated_at: Utc::now(),
        };
        session.set_authenticated(auth.clone());
        Ok(auth)
    }

    async fn await_completion<C: BrowsingContext>(
        &self,
        ctx: &C,
        standing: &[String],
    ) -> HarnessResult<CompletionSignal> {
        let options = WaitOptions::new()
            .with_timeout(self.config.completion_timeout_ms)
            .with_poll_interval(self.config.poll_interval_ms);
        let raced = tokio::select! {
            biased;
            banner = poll_until(&options, move || self.fresh_banner(ctx, standing)) => {
                banner?.map(|banner| Err(HarnessError::AuthenticationRejected { banner }))
            }
            left = poll_until(&options, move || self.left_login_route(ctx)) => left?.map(Ok),
            landmark = poll_until(&options, move || self.landmark_visible(ctx)) => {
                landmark?.map(Ok)
            }
        };
        if let Some(result) = raced {
            return result;
        }

        let url = ctx.current_url().await.unwrap_or_default();
        if !url.is_empty() && !self.is_login_route(&url) {
            return Ok(CompletionSignal::LeftLoginRoute);
        }
        if let Some(banner) = self.visible_banner(ctx, &[]).await? {
            return Err(HarnessError::AuthenticationRejected { banner });
        }
        match self.config.timeout_policy {
            TimeoutPolicy::Fail => Err(HarnessError::AuthenticationTimeout {
                ms: self.config.completion_timeout_ms,
                url,
            }),
            TimeoutPolicy::AssumeSuccess => {
                tracing::warn!(
                    ms = self.config.completion_timeout_ms,
                    url = %url,
                    "no login signal, assuming success"
                );
                Ok(CompletionSignal::TimedOut)
            }
        }
    }

    async fn left_login_route<C: BrowsingContext>(
        &self,
        ctx: &C,
    ) -> HarnessResult<Option<CompletionSignal>> {
        match ctx.current_url().await {
            Ok(url) if !self.is_login_route(&url) => Ok(Some(CompletionSignal::LeftLoginRoute)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::trace!(error = %e, "location poll failed");
                Ok(None)
            }
        }
    }

    async fn landmark_visible<C: BrowsingContext>(
        &self,
        ctx: &C,
    ) -> HarnessResult<Option<CompletionSignal>> {
        for selector in self.config.landmarks.iter() {
            match ctx.probe(selector).await {
                Ok(probe) if probe.visible.is_some() => {
                    return Ok(Some(CompletionSignal::LandmarkPresent));
                }
                Ok(_) => {}
                Err(e @ HarnessError::SelectorSyntax { .. }) => return Err(e),
                Err(e) => tracing::trace!(error = %e, "landmark poll failed"),
            }
        }
        Ok(None)
    }

    /// A banner shown on the login route that was not already there before submit
    async fn fresh_banner<C: BrowsingContext>(
        &self,
        ctx: &C,
        standing: &[String],
    ) -> HarnessResult<Option<String>> {
        let on_login = ctx
            .current_url()
            .await
            .map(|url| self.is_login_route(&url))
            .unwrap_or(false);
        if !on_login {
            return Ok(None);
        }
        self.visible_banner(ctx, standing).await
    }

    /// Texts of every visible, non-empty error banner
    async fn visible_banners<C: BrowsingContext>(&self, ctx: &C) -> HarnessResult<Vec<String>> {
        let mut texts = Vec::new();
        for selector in self.config.error_banners.iter() {
            let probe = match ctx.probe(selector).await {
                Ok(probe) => probe,
                Err(e @ HarnessError::SelectorSyntax { .. }) => return Err(e),
                Err(_) => continue,
            };
            let Some(element) = probe.visible else {
                continue;
            };
            let text = ctx.text_of(&element).await.unwrap_or_default();
            let text = text.trim();
            if !text.is_empty() {
                texts.push(text.to_string());
            }
        }
        Ok(texts)
    }

    /// First visible banner whose text is not in `ignore`
    async fn visible_banner<C: BrowsingContext>(
        &self,
        ctx: &C,
        ignore: &[String],
    ) -> HarnessResult<Option<String>> {
        Ok(self
            .visible_banners(ctx)
            .await?
            .into_iter()
            .find(|text| !ignore.contains(text)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::{ClickReaction, LoginForm, MockContext, MockElement, MockPage};

    const BASE: &str = "https://app.test";

    fn login_page(submit: MockElement) -> MockPage {
        MockPage::new("/login")
            .with_element(MockElement::new("#email").alias("input[type=email]"))
            .with_element(MockElement::new("#password").alias("input[type=password]"))
            .with_element(MockElement::new(".alert-danger").hidden())
            .with_element(submit.alias("button[type=submit]"))
    }

    fn crm_site() -> MockContext {
        MockContext::new()
            .with_protected("/admin")
            .with_credentials("agent@crm.test", "hunter2")
            .with_page(login_page(MockElement::new("#login").on_click(
                ClickReaction::SubmitLogin(LoginForm::new("#email", "#password")),
            )))
            .with_page(MockPage::new("/admin").with_element(MockElement::new("nav.sidebar")))
    }

    fn session(ctx: &MockContext) -> BrowsingSession<MockContext> {
        BrowsingSession::new(ctx.clone())
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("agent@crm.test", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("agent@crm.test"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_is_login_route() {
        let auth = AuthSession::new(AuthConfig::default(), BASE);
        assert!(auth.is_login_route("https://app.test/login"));
        assert!(auth.is_login_route("https://app.test/login?next=/admin"));
        assert!(auth.is_login_route("https://app.test/login/"));
        assert!(!auth.is_login_route("https://app.test/loginhelp"));
        assert!(!auth.is_login_route("https://app.test/admin"));
    }

    #[test]
    fn test_config_from_yaml_keeps_defaults() {
        let yaml = "timeout_policy: assume_success\nlogin_path: /signin\n";
        let config: AuthConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.timeout_policy, TimeoutPolicy::AssumeSuccess);
        assert_eq!(config.login_path, "/signin");
        assert_eq!(config.completion_timeout_ms, 15_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_leaves_login_route() {
        let ctx = crm_site();
        let mut session = session(&ctx);
        let auth = AuthSession::new(AuthConfig::default(), BASE)
            .login(&mut session, &Credentials::new("agent@crm.test", "hunter2"))
            .await
            .unwrap();
        assert_eq!(auth.signal, CompletionSignal::LeftLoginRoute);
        assert_eq!(auth.landed_url, "https://app.test/admin");
        assert!(session.is_authenticated());
        assert_eq!(ctx.visits(), vec!["/login", "/admin"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_login_rejected_as_already_authenticated() {
        let ctx = crm_site();
        let mut session = session(&ctx);
        let auth = AuthSession::new(AuthConfig::default(), BASE);
        let creds = Credentials::new("agent@crm.test", "hunter2");
        auth.login(&mut session, &creds).await.unwrap();
        let err = auth.login(&mut session, &creds).await.unwrap_err();
        assert!(matches!(err, HarnessError::AlreadyAuthenticated { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_via_fallback_identifier_candidate() {
        let ctx = MockContext::new()
            .with_credentials("agent", "hunter2")
            .with_page(
                MockPage::new("/login")
                    .with_element(MockElement::new("input[name=username]"))
                    .with_element(MockElement::new("input[type=password]"))
                    .with_element(MockElement::new("button[type=submit]").on_click(
                        ClickReaction::SubmitLogin(LoginForm::new(
                            "input[name=username]",
                            "input[type=password]",
                        )),
                    )),
            )
            .with_page(MockPage::new("/admin"));
        let mut session = session(&ctx);
        let config = AuthConfig {
            identifier_fields: CandidateList::new(["input[type=email]", "input[name=username]"]),
            ..AuthConfig::default()
        };
        let auth = AuthSession::new(config, BASE)
            .login(&mut session, &Credentials::new("agent", "hunter2"))
            .await
            .unwrap();
        assert_eq!(auth.signal, CompletionSignal::LeftLoginRoute);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_secret_rejected_with_banner() {
        let ctx = crm_site();
        let mut session = session(&ctx);
        let err = AuthSession::new(AuthConfig::default(), BASE)
            .login(&mut session, &Credentials::new("agent@crm.test", "wrong"))
            .await
            .unwrap_err();
        match err {
            HarnessError::AuthenticationRejected { banner } => {
                assert_eq!(banner, "Invalid email or password");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!session.is_authenticated());
    }

    fn site_with_notice(submit: ClickReaction) -> MockContext {
        MockContext::new()
            .with_protected("/admin")
            .with_credentials("agent@crm.test", "hunter2")
            .with_page(
                login_page(MockElement::new("#login").on_click(submit)).with_element(
                    MockElement::new("[role=alert]").with_text("Scheduled maintenance tonight"),
                ),
            )
            .with_page(MockPage::new("/admin"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_standing_notice_does_not_reject_valid_login() {
        let submit = ClickReaction::SubmitLogin(LoginForm::new("#email", "#password"))
            .after(Duration::from_millis(300));
        let ctx = site_with_notice(submit);
        let mut session = session(&ctx);
        let auth = AuthSession::new(AuthConfig::default(), BASE)
            .login(&mut session, &Credentials::new("agent@crm.test", "hunter2"))
            .await
            .unwrap();
        assert_eq!(auth.signal, CompletionSignal::LeftLoginRoute);
        assert_eq!(auth.landed_url, "https://app.test/admin");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_banner_rejected_next_to_standing_notice() {
        let submit = ClickReaction::SubmitLogin(LoginForm::new("#email", "#password"));
        let ctx = site_with_notice(submit);
        let mut session = session(&ctx);
        let err = AuthSession::new(AuthConfig::default(), BASE)
            .login(&mut session, &Credentials::new("agent@crm.test", "wrong"))
            .await
            .unwrap_err();
        match err {
            HarnessError::AuthenticationRejected { banner } => {
                assert_eq!(banner, "Invalid email or password");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_banner_still_shown_after_timeout_rejects() {
        let ctx = MockContext::new().with_page(
            login_page(MockElement::new("#login"))
                .with_element(MockElement::new("[role=alert]").with_text("Account locked")),
        );
        let mut session = session(&ctx);
        let err = AuthSession::new(AuthConfig::default().with_completion_timeout(1_000), BASE)
            .login(&mut session, &Credentials::new("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::AuthenticationRejected { banner } if banner == "Account locked"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_landmark_completes_single_page_login() {
        let ctx = MockContext::new()
            .with_page(login_page(
                MockElement::new("#login").on_click(
                    ClickReaction::reveal("nav.sidebar").after(Duration::from_millis(400)),
                ),
            ))
            .with_element(MockElement::new("nav.sidebar").hidden());
        let mut session = session(&ctx);
        let auth = AuthSession::new(AuthConfig::default(), BASE)
            .login(&mut session, &Credentials::new("a", "b"))
            .await
            .unwrap();
        assert_eq!(auth.signal, CompletionSignal::LandmarkPresent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_form_times_out() {
        let ctx = MockContext::new().with_page(login_page(MockElement::new("#login")));
        let mut session = session(&ctx);
        let err = AuthSession::new(AuthConfig::default().with_completion_timeout(1_000), BASE)
            .login(&mut session, &Credentials::new("a", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::AuthenticationTimeout { ms: 1_000, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_form_assumed_success_by_policy() {
        let ctx = MockContext::new().with_page(login_page(MockElement::new("#login")));
        let mut session = session(&ctx);
        let config = AuthConfig::default()
            .with_completion_timeout(1_000)
            .with_timeout_policy(TimeoutPolicy::AssumeSuccess);
        let auth = AuthSession::new(config, BASE)
            .login(&mut session, &Credentials::new("a", "b"))
            .await
            .unwrap();
        assert_eq!(auth.signal, CompletionSignal::TimedOut);
        assert!(session.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_form_reports_all_candidates() {
        let ctx = MockContext::new().with_page(MockPage::new("/login"));
        let mut session = session(&ctx);
        let err = AuthSession::new(AuthConfig::default(), BASE)
            .login(&mut session, &Credentials::new("a", "b"))
            .await
            .unwrap_err();
        let HarnessError::ElementNotFound { candidates, .. } = err else {
            panic!("expected ElementNotFound");
        };
        assert_eq!(candidates.len(), 5);
        assert_eq!(candidates[0], "input[type=email]");
    }
}
