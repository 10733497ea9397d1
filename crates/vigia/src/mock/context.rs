//! In-memory browsing context.

use super::site::{selector_error, ClickReaction, LoginForm, MockElement, MockPage};
use crate::context::{
    route_path, BrowsingContext, ContextFactory, ElementHandle, PageSignal, Probe, SignalReceiver,
};
use crate::device::{DeviceProfile, Viewport};
use crate::result::{HarnessError, HarnessResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// PNG signature followed by a marker; enough for artifact tests
const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nvigia-mock";

#[derive(Debug, Clone)]
struct MockState {
    origin: String,
    login_route: String,
    pages: HashMap<String, MockPage>,
    global: Vec<MockElement>,
    protected: Vec<String>,
    unreachable: HashSet<String>,
    credentials: Option<(String, String)>,
    logged_in: bool,
    route: String,
    query: String,
    dom: Vec<MockElement>,
    viewport: Viewport,
    user_agent: Option<String>,
    scale_factor: f64,
    mobile: bool,
    subscribers: Vec<mpsc::UnboundedSender<PageSignal>>,
    visits: Vec<String>,
    screenshots: usize,
    flaky_probes: usize,
    closed: bool,
    close_count: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            origin: "https://app.test".to_string(),
            login_route: "/login".to_string(),
            pages: HashMap::new(),
            global: Vec::new(),
            protected: Vec::new(),
            unreachable: HashSet::new(),
            credentials: None,
            logged_in: false,
            route: "/".to_string(),
            query: String::new(),
            dom: Vec::new(),
            viewport: Viewport::default(),
            user_agent: None,
            scale_factor: 1.0,
            mobile: false,
            subscribers: Vec::new(),
            visits: Vec::new(),
            screenshots: 0,
            flaky_probes: 0,
            closed: false,
            close_count: 0,
        }
    }
}

impl MockState {
    fn current_url(&self) -> String {
        format!("{}{}{}", self.origin, self.route, self.query)
    }

    fn load(&mut self, route: &str) {
        let mut route = route.to_string();
        let mut query = String::new();
        if !self.logged_in && self.protected.iter().any(|p| route.starts_with(p.as_str())) {
            query = format!("?next={route}");
            route.clone_from(&self.login_route);
        }
        self.dom = self.global.clone();
        let mut signals = Vec::new();
        if let Some(page) = self.pages.get(&route) {
            self.dom.extend(page.elements.iter().cloned());
            signals.clone_from(&page.signals);
        }
        self.visits.push(route.clone());
        self.route = route;
        self.query = query;
        for signal in signals {
            self.emit(signal);
        }
    }

    fn emit(&mut self, signal: PageSignal) {
        self.subscribers.retain(|tx| tx.send(signal.clone()).is_ok());
    }

    fn matches(&self, selector: &str) -> impl Iterator<Item = (usize, &MockElement)> + '_ {
        let selector = selector.to_string();
        self.dom
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.matches(&selector))
    }

    fn element_mut(&mut self, handle: &ElementHandle) -> HarnessResult<&mut MockElement> {
        let position = self
            .matches(&handle.selector)
            .nth(handle.index)
            .map(|(i, _)| i)
            .ok_or_else(|| {
                HarnessError::browser(format!("element `{}` is detached", handle.selector))
            })?;
        Ok(&mut self.dom[position])
    }

    fn value_of(&self, selector: &str) -> String {
        self.matches(selector)
            .next()
            .map(|(_, e)| e.value.clone())
            .unwrap_or_default()
    }

    fn reveal(&mut self, selector: &str) {
        for element in self.dom.iter_mut().filter(|e| e.matches(selector)) {
            element.visible = true;
        }
    }

    fn submit_login(&mut self, form: &LoginForm) {
        let identifier = self.value_of(&form.identifier_field);
        let secret = self.value_of(&form.secret_field);
        let accepted = self
            .credentials
            .as_ref()
            .is_some_and(|(id, s)| *id == identifier && *s == secret);
        if accepted {
            self.logged_in = true;
            self.load(&form.success_route);
        } else {
            for element in self.dom.iter_mut().filter(|e| e.matches(&form.banner)) {
                element.visible = true;
                element.text.clone_from(&form.banner_text);
            }
        }
    }

    fn ensure_open(&self) -> HarnessResult<()> {
        if self.closed {
            return Err(HarnessError::browser("context is closed"));
        }
        Ok(())
    }
}

/// In-memory [`BrowsingContext`].
///
/// Clones share state, so a test can keep a handle for inspection while the
/// harness owns another.
#[derive(Debug, Clone, Default)]
pub struct MockContext {
    state: Arc<Mutex<MockState>>,
}

impl MockContext {
    /// Blank site at `https://app.test` with `/login` as login route
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn edit(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.lock());
        self
    }

    // ========================================================================
    // Site builders
    // ========================================================================

    /// Element present on every page
    #[must_use]
    pub fn with_element(self, element: MockElement) -> Self {
        self.edit(|s| {
            s.global.push(element.clone());
            s.dom.push(element);
        })
    }

    /// Serve a page
    #[must_use]
    pub fn with_page(self, page: MockPage) -> Self {
        self.edit(|s| {
            s.pages.insert(page.route.clone(), page);
        })
    }

    /// Redirect unauthenticated visits under `prefix` to the login route
    #[must_use]
    pub fn with_protected(self, prefix: impl Into<String>) -> Self {
        self.edit(|s| s.protected.push(prefix.into()))
    }

    /// Accept these credentials on login forms
    #[must_use]
    pub fn with_credentials(
        self,
        identifier: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.edit(|s| s.credentials = Some((identifier.into(), secret.into())))
    }

    /// Navigations to `route` never finish
    #[must_use]
    pub fn with_unreachable(self, route: impl Into<String>) -> Self {
        self.edit(|s| {
            s.unreachable.insert(route.into());
        })
    }

    /// Change the login route
    #[must_use]
    pub fn with_login_route(self, route: impl Into<String>) -> Self {
        self.edit(|s| s.login_route = route.into())
    }

    /// Independent copy of the site, freshly loaded and unsubscribed
    #[must_use]
    pub fn fresh(&self) -> Self {
        let mut state = self.lock().clone();
        state.subscribers.clear();
        state.visits.clear();
        state.logged_in = false;
        state.closed = false;
        state.close_count = 0;
        state.screenshots = 0;
        state.route = "/".to_string();
        state.query.clear();
        state.dom = state.global.clone();
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    // ========================================================================
    // Test controls and inspection
    // ========================================================================

    /// Make every element matching `selector` visible
    pub fn reveal(&self, selector: &str) {
        self.lock().reveal(selector);
    }

    /// Emit a signal to subscribers
    pub fn emit(&self, signal: PageSignal) {
        self.lock().emit(signal);
    }

    /// Fail the next `count` probes the way a page torn down by navigation does
    pub fn fail_next_probes(&self, count: usize) {
        self.lock().flaky_probes = count;
    }

    /// User agent override in effect
    #[must_use]
    pub fn user_agent(&self) -> Option<String> {
        self.lock().user_agent.clone()
    }

    /// Value typed into the first element matching `selector`
    #[must_use]
    pub fn value_of(&self, selector: &str) -> String {
        self.lock().value_of(selector)
    }

    /// Routes loaded so far, including redirect targets
    #[must_use]
    pub fn visits(&self) -> Vec<String> {
        self.lock().visits.clone()
    }

    /// Number of screenshots taken
    #[must_use]
    pub fn screenshot_count(&self) -> usize {
        self.lock().screenshots
    }

    /// Whether `close` has run
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// How many times `close` reached the context
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    fn apply_reaction(&self, reaction: ClickReaction) {
        match reaction {
            ClickReaction::Delayed { after, reaction } => {
                let ctx = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    if !ctx.is_closed() {
                        ctx.apply_reaction(*reaction);
                    }
                });
            }
            ClickReaction::Panic(message) => panic!("{message}"),
            other => {
                let mut state = self.lock();
                match other {
                    ClickReaction::Navigate(route) => state.load(&route),
                    ClickReaction::Reveal(selector) => state.reveal(&selector),
                    ClickReaction::ShowText { selector, text } => {
                        for element in state.dom.iter_mut().filter(|e| e.matches(&selector)) {
                            element.visible = true;
                            element.text.clone_from(&text);
                        }
                    }
                    ClickReaction::Emit(signal) => state.emit(signal),
                    ClickReaction::SubmitLogin(form) => state.submit_login(&form),
                    ClickReaction::Delayed { .. } | ClickReaction::Panic(_) => {}
                }
            }
        }
    }
}

#[async_trait]
impl BrowsingContext for MockContext {
    async fn goto(&mut self, url: &str, timeout: Duration) -> HarnessResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        let route = route_path(url).to_string();
        if state.unreachable.contains(&route) {
            return Err(HarnessError::NavigationTimeout {
                url: url.to_string(),
                ms: timeout.as_millis() as u64,
            });
        }
        state.load(&route);
        Ok(())
    }

    async fn current_url(&self) -> HarnessResult<String> {
        let state = self.lock();
        state.ensure_open()?;
        Ok(state.current_url())
    }

    async fn set_viewport(
        &mut self,
        viewport: Viewport,
        device_scale_factor: f64,
        mobile: bool,
    ) -> HarnessResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.viewport = viewport;
        state.scale_factor = device_scale_factor;
        state.mobile = mobile;
        Ok(())
    }

    async fn set_user_agent(&mut self, user_agent: &str) -> HarnessResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.user_agent = Some(user_agent.to_string());
        Ok(())
    }

    async fn viewport(&self) -> HarnessResult<Viewport> {
        let state = self.lock();
        state.ensure_open()?;
        Ok(state.viewport)
    }

    async fn probe(&self, selector: &str) -> HarnessResult<Probe> {
        if let Some(message) = selector_error(selector) {
            return Err(HarnessError::SelectorSyntax {
                selector: selector.to_string(),
                message: message.to_string(),
            });
        }
        let mut state = self.lock();
        state.ensure_open()?;
        if state.flaky_probes > 0 {
            state.flaky_probes -= 1;
            return Err(HarnessError::browser("Execution context was destroyed"));
        }
        let mut probe = Probe::empty();
        for (index, (_, element)) in state.matches(selector).enumerate() {
            probe.matches += 1;
            if element.visible && probe.visible.is_none() {
                probe.visible = Some(ElementHandle::new(selector, index));
            }
        }
        Ok(probe)
    }

    async fn fill(&self, element: &ElementHandle, value: &str) -> HarnessResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        let target = state.element_mut(element)?;
        if !target.visible {
            return Err(HarnessError::browser(format!(
                "element `{}` is not interactable",
                element.selector
            )));
        }
        target.value = value.to_string();
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> HarnessResult<()> {
        let reactions = {
            let mut state = self.lock();
            state.ensure_open()?;
            let target = state.element_mut(element)?;
            if !target.visible {
                return Err(HarnessError::browser(format!(
                    "element `{}` is not interactable",
                    element.selector
                )));
            }
            target.on_click.clone()
        };
        for reaction in reactions {
            self.apply_reaction(reaction);
        }
        Ok(())
    }

    async fn text_of(&self, element: &ElementHandle) -> HarnessResult<String> {
        let mut state = self.lock();
        state.ensure_open()?;
        Ok(state.element_mut(element)?.text.clone())
    }

    async fn screenshot(&self) -> HarnessResult<Vec<u8>> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.screenshots += 1;
        Ok(FAKE_PNG.to_vec())
    }

    async fn subscribe(&self) -> HarnessResult<SignalReceiver> {
        let mut state = self.lock();
        state.ensure_open()?;
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(tx);
        Ok(rx)
    }

    async fn close(&mut self) -> HarnessResult<()> {
        let mut state = self.lock();
        state.closed = true;
        state.close_count += 1;
        state.subscribers.clear();
        Ok(())
    }
}

/// Opens a fresh copy of a mock site per scenario
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    site: MockContext,
    opened: Arc<Mutex<Vec<MockContext>>>,
    fail_open: bool,
}

impl MockFactory {
    /// Factory serving `site`
    #[must_use]
    pub fn new(site: MockContext) -> Self {
        Self {
            site,
            opened: Arc::default(),
            fail_open: false,
        }
    }

    /// Every `open` fails (browser could not start)
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Contexts handed out so far
    #[must_use]
    pub fn opened(&self) -> Vec<MockContext> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ContextFactory for MockFactory {
    type Context = MockContext;

    async fn open(&self, profile: &DeviceProfile) -> HarnessResult<MockContext> {
        if self.fail_open {
            return Err(HarnessError::browser(format!(
                "could not open context for {}",
                profile.name
            )));
        }
        let context = self.site.fresh();
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context.clone());
        Ok(context)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::ConsoleLevel;

    const T: Duration = Duration::from_secs(1);

    fn site() -> MockContext {
        MockContext::new()
            .with_protected("/admin")
            .with_credentials("agent@crm.test", "hunter2")
            .with_page(
                MockPage::new("/login")
                    .with_element(MockElement::new("#email"))
                    .with_element(MockElement::new("#password"))
                    .with_element(MockElement::new(".alert-danger").hidden())
                    .with_element(
                        MockElement::new("button[type=submit]").on_click(
                            ClickReaction::SubmitLogin(LoginForm::new("#email", "#password")),
                        ),
                    ),
            )
            .with_page(MockPage::new("/admin").with_element(MockElement::new("nav.sidebar")))
    }

    #[tokio::test]
    async fn test_protected_route_redirects() {
        let mut ctx = site();
        ctx.goto("https://app.test/admin/requests", T).await.unwrap();
        assert_eq!(
            ctx.current_url().await.unwrap(),
            "https://app.test/login?next=/admin/requests"
        );
    }

    #[tokio::test]
    async fn test_login_success_navigates() {
        let mut ctx = site();
        ctx.goto("https://app.test/login", T).await.unwrap();
        let email = ctx.probe("#email").await.unwrap().visible.unwrap();
        let password = ctx.probe("#password").await.unwrap().visible.unwrap();
        ctx.fill(&email, "agent@crm.test").await.unwrap();
        ctx.fill(&password, "hunter2").await.unwrap();
        let submit = ctx.probe("button[type=submit]").await.unwrap().visible.unwrap();
        ctx.click(&submit).await.unwrap();
        assert_eq!(ctx.current_url().await.unwrap(), "https://app.test/admin");
        assert!(ctx.probe("nav.sidebar").await.unwrap().visible.is_some());
    }

    #[tokio::test]
    async fn test_login_failure_shows_banner() {
        let mut ctx = site();
        ctx.goto("https://app.test/login", T).await.unwrap();
        let submit = ctx.probe("button[type=submit]").await.unwrap().visible.unwrap();
        ctx.click(&submit).await.unwrap();
        let banner = ctx.probe(".alert-danger").await.unwrap().visible.unwrap();
        assert_eq!(ctx.text_of(&banner).await.unwrap(), "Invalid email or password");
    }

    #[tokio::test]
    async fn test_page_signals_reach_subscribers() {
        let mut ctx = MockContext::new().with_page(
            MockPage::new("/contact").with_signal(PageSignal::console(ConsoleLevel::Error, "boom")),
        );
        let mut rx = ctx.subscribe().await.unwrap();
        ctx.goto("https://app.test/contact", T).await.unwrap();
        assert!(matches!(rx.try_recv().unwrap(), PageSignal::Console { .. }));
    }

    #[tokio::test]
    async fn test_fresh_copies_are_isolated() {
        let factory = MockFactory::new(site());
        let profile = DeviceProfile::new("d", 800, 600);
        let mut a = factory.open(&profile).await.unwrap();
        let b = factory.open(&profile).await.unwrap();
        a.goto("https://app.test/login", T).await.unwrap();
        a.close().await.unwrap();
        assert!(!b.is_closed());
        assert_eq!(factory.opened().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_context_rejects_calls() {
        let mut ctx = MockContext::new();
        ctx.close().await.unwrap();
        assert!(ctx.current_url().await.is_err());
    }
}
