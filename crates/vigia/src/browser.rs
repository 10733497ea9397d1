//! Browser control over the Chrome `DevTools` Protocol.
//!
//! With the `browser` feature, [`CdpBrowser`] launches one Chromium process
//! and hands every scenario its own CDP browser context (separate cookies,
//! storage and cache). Without the feature only [`BrowserConfig`] is
//! available and scenarios run against the in-memory driver.

/// Browser configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Initial window size; every context overrides it per device
    pub window_size: (u32, u32),
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            window_size: (1280, 800),
        }
    }
}

impl BrowserConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::wildcard_imports)]
mod cdp {
    use super::*;
    use crate::context::{
        BrowsingContext, ConsoleLevel, ContextFactory, ElementHandle, PageSignal, Probe,
        SignalReceiver,
    };
    use crate::device::{DeviceProfile, Viewport};
    use crate::result::{HarnessError, HarnessResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
    use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
    use chromiumoxide::cdp::browser_protocol::network::{
        EventLoadingFailed, EventRequestWillBeSent, EventResponseReceived,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::cdp::browser_protocol::target::{
        CreateBrowserContextParams, CreateTargetParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::{
        ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
    };
    use chromiumoxide::element::Element;
    use chromiumoxide::page::Page;
    use futures::stream::{BoxStream, StreamExt};
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, Mutex};

    fn cdp_error(e: impl std::fmt::Display) -> HarnessError {
        HarnessError::browser(e.to_string())
    }

    /// Chromium process shared by every scenario of a run
    #[derive(Debug)]
    pub struct CdpBrowser {
        config: BrowserConfig,
        inner: Arc<Mutex<Browser>>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl CdpBrowser {
        /// Launch Chromium
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(config: BrowserConfig) -> HarnessResult<Self> {
            let (width, height) = config.window_size;
            let mut builder = CdpConfig::builder().window_size(width, height);

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder.build().map_err(cdp_error)?;
            let (browser, mut handler) = Browser::launch(cdp_config).await.map_err(cdp_error)?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            tracing::info!(headless = config.headless, "browser launched");
            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser
        pub async fn close(self) -> HarnessResult<()> {
            let mut browser = self.inner.lock().await;
            browser.close().await.map_err(cdp_error)?;
            drop(browser);
            self.handle.abort();
            Ok(())
        }
    }

    #[async_trait]
    impl ContextFactory for CdpBrowser {
        type Context = CdpContext;

        async fn open(&self, profile: &DeviceProfile) -> HarnessResult<CdpContext> {
            let mut browser = self.inner.lock().await;
            let context_id = browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await
                .map_err(cdp_error)?;
            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context_id.clone())
                .build()
                .map_err(cdp_error)?;
            let page = browser.new_page(target).await.map_err(cdp_error)?;
            drop(browser);
            tracing::debug!(device = %profile.name, "opened browser context");
            Ok(CdpContext {
                page: Some(page),
                context_id: Some(context_id),
                browser: Arc::clone(&self.inner),
            })
        }
    }

    /// One CDP browser context with a single page
    #[derive(Debug)]
    pub struct CdpContext {
        page: Option<Page>,
        context_id: Option<BrowserContextId>,
        browser: Arc<Mutex<Browser>>,
    }

    #[derive(Debug, Deserialize)]
    struct ProbeReply {
        #[serde(default)]
        matches: usize,
        #[serde(default = "no_index")]
        visible: i64,
        #[serde(default)]
        error: Option<String>,
    }

    const fn no_index() -> i64 {
        -1
    }

    const CLEAR_VALUE: &str = "function() { \
        this.value = ''; \
        this.dispatchEvent(new Event('input', { bubbles: true })); \
    }";

    /// Mobile emulation lays out pages without a viewport meta tag at 980px,
    /// so `innerWidth` is not the device width; the screen override is.
    const VIEWPORT_SCRIPT: &str = "({ width: screen.width, height: screen.height })";

    fn metrics_override(
        viewport: Viewport,
        device_scale_factor: f64,
        mobile: bool,
    ) -> HarnessResult<SetDeviceMetricsOverrideParams> {
        let width = i64::from(viewport.width);
        let height = i64::from(viewport.height);
        SetDeviceMetricsOverrideParams::builder()
            .width(width)
            .height(height)
            .screen_width(width)
            .screen_height(height)
            .device_scale_factor(device_scale_factor)
            .mobile(mobile)
            .build()
            .map_err(cdp_error)
    }

    fn probe_script(selector: &str) -> HarnessResult<String> {
        let literal = serde_json::to_string(selector)?;
        Ok(format!(
            "(() => {{ \
                let nodes; \
                try {{ nodes = Array.from(document.querySelectorAll({literal})); }} \
                catch (e) {{ return {{ error: String(e && e.message || e) }}; }} \
                const visible = nodes.findIndex(n => {{ \
                    const r = n.getBoundingClientRect(); \
                    const s = window.getComputedStyle(n); \
                    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' \
                        && s.display !== 'none' && s.opacity !== '0'; \
                }}); \
                return {{ matches: nodes.length, visible }}; \
            }})()"
        ))
    }

    fn describe(args: &[RemoteObject]) -> String {
        args.iter()
            .map(|arg| match (&arg.value, &arg.description) {
                (Some(serde_json::Value::String(s)), _) => s.clone(),
                (Some(v), _) => v.to_string(),
                (None, Some(d)) => d.clone(),
                (None, None) => String::new(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    const fn console_level(kind: &ConsoleApiCalledType) -> ConsoleLevel {
        match kind {
            ConsoleApiCalledType::Error | ConsoleApiCalledType::Assert => ConsoleLevel::Error,
            ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
            ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
            ConsoleApiCalledType::Info => ConsoleLevel::Info,
            _ => ConsoleLevel::Log,
        }
    }

    enum RawEvent {
        Console(Arc<EventConsoleApiCalled>),
        Exception(Arc<EventExceptionThrown>),
        Request(Arc<EventRequestWillBeSent>),
        Response(Arc<EventResponseReceived>),
        Failed(Arc<EventLoadingFailed>),
    }

    impl CdpContext {
        fn page(&self) -> HarnessResult<&Page> {
            self.page
                .as_ref()
                .ok_or_else(|| HarnessError::browser("context is closed"))
        }

        async fn element(&self, handle: &ElementHandle) -> HarnessResult<Element> {
            let mut elements = self
                .page()?
                .find_elements(handle.selector.as_str())
                .await
                .map_err(cdp_error)?;
            if handle.index >= elements.len() {
                return Err(HarnessError::browser(format!(
                    "element `{}` is detached",
                    handle.selector
                )));
            }
            Ok(elements.swap_remove(handle.index))
        }
    }

    #[async_trait]
    impl BrowsingContext for CdpContext {
        async fn goto(&mut self, url: &str, timeout: Duration) -> HarnessResult<()> {
            let page = self.page()?;
            match tokio::time::timeout(timeout, page.goto(url)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(HarnessError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                }),
                Err(_) => Err(HarnessError::NavigationTimeout {
                    url: url.to_string(),
                    ms: timeout.as_millis() as u64,
                }),
            }
        }

        async fn current_url(&self) -> HarnessResult<String> {
            let url = self.page()?.url().await.map_err(cdp_error)?;
            Ok(url.unwrap_or_else(|| "about:blank".to_string()))
        }

        async fn set_viewport(
            &mut self,
            viewport: Viewport,
            device_scale_factor: f64,
            mobile: bool,
        ) -> HarnessResult<()> {
            let params = metrics_override(viewport, device_scale_factor, mobile)?;
            self.page()?.execute(params).await.map_err(cdp_error)?;
            Ok(())
        }

        async fn set_user_agent(&mut self, user_agent: &str) -> HarnessResult<()> {
            self.page()?
                .set_user_agent(user_agent)
                .await
                .map_err(cdp_error)?;
            Ok(())
        }

        async fn viewport(&self) -> HarnessResult<Viewport> {
            self.page()?
                .evaluate(VIEWPORT_SCRIPT)
                .await
                .map_err(cdp_error)?
                .into_value()
                .map_err(cdp_error)
        }

        async fn probe(&self, selector: &str) -> HarnessResult<Probe> {
            let reply: ProbeReply = self
                .page()?
                .evaluate(probe_script(selector)?)
                .await
                .map_err(cdp_error)?
                .into_value()
                .map_err(cdp_error)?;
            if let Some(message) = reply.error {
                return Err(HarnessError::SelectorSyntax {
                    selector: selector.to_string(),
                    message,
                });
            }
            Ok(Probe {
                matches: reply.matches,
                visible: usize::try_from(reply.visible)
                    .ok()
                    .map(|index| ElementHandle::new(selector, index)),
            })
        }

        async fn fill(&self, element: &ElementHandle, value: &str) -> HarnessResult<()> {
            let target = self.element(element).await?;
            target
                .call_js_fn(CLEAR_VALUE, false)
                .await
                .map_err(cdp_error)?;
            target.click().await.map_err(cdp_error)?;
            target.type_str(value).await.map_err(cdp_error)?;
            Ok(())
        }

        async fn click(&self, element: &ElementHandle) -> HarnessResult<()> {
            self.element(element)
                .await?
                .click()
                .await
                .map_err(cdp_error)?;
            Ok(())
        }

        async fn text_of(&self, element: &ElementHandle) -> HarnessResult<String> {
            let text = self
                .element(element)
                .await?
                .inner_text()
                .await
                .map_err(cdp_error)?;
            Ok(text.unwrap_or_default())
        }

        async fn screenshot(&self) -> HarnessResult<Vec<u8>> {
            use base64::Engine;

            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let screenshot = self
                .page()?
                .execute(params)
                .await
                .map_err(|e| HarnessError::Screenshot {
                    message: e.to_string(),
                })?;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| HarnessError::Screenshot {
                    message: e.to_string(),
                })
        }

        async fn subscribe(&self) -> HarnessResult<SignalReceiver> {
            let page = self.page()?;
            let streams: Vec<BoxStream<'static, RawEvent>> = vec![
                page.event_listener::<EventConsoleApiCalled>()
                    .await
                    .map_err(cdp_error)?
                    .map(RawEvent::Console)
                    .boxed(),
                page.event_listener::<EventExceptionThrown>()
                    .await
                    .map_err(cdp_error)?
                    .map(RawEvent::Exception)
                    .boxed(),
                page.event_listener::<EventRequestWillBeSent>()
                    .await
                    .map_err(cdp_error)?
                    .map(RawEvent::Request)
                    .boxed(),
                page.event_listener::<EventResponseReceived>()
                    .await
                    .map_err(cdp_error)?
                    .map(RawEvent::Response)
                    .boxed(),
                page.event_listener::<EventLoadingFailed>()
                    .await
                    .map_err(cdp_error)?
                    .map(RawEvent::Failed)
                    .boxed(),
            ];

            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(async move {
                let mut events = futures::stream::select_all(streams);
                let mut requests: HashMap<String, (String, String)> = HashMap::new();
                while let Some(event) = events.next().await {
                    let signal = match event {
                        RawEvent::Console(e) => Some(PageSignal::console(
                            console_level(&e.r#type),
                            describe(&e.args),
                        )),
                        RawEvent::Exception(e) => {
                            let details = &e.exception_details;
                            let text = details
                                .exception
                                .as_ref()
                                .and_then(|x| x.description.clone())
                                .unwrap_or_else(|| details.text.clone());
                            Some(PageSignal::exception(text))
                        }
                        RawEvent::Request(e) => {
                            requests.insert(
                                e.request_id.inner().clone(),
                                (e.request.method.clone(), e.request.url.clone()),
                            );
                            None
                        }
                        RawEvent::Response(e) => {
                            let method = requests
                                .get(e.request_id.inner())
                                .map_or_else(|| "GET".to_string(), |(m, _)| m.clone());
                            let status = u16::try_from(e.response.status).unwrap_or(0);
                            Some(PageSignal::response(method, e.response.url.clone(), status))
                        }
                        RawEvent::Failed(e) => {
                            let (method, url) = requests
                                .get(e.request_id.inner())
                                .cloned()
                                .unwrap_or_else(|| ("GET".to_string(), String::new()));
                            Some(PageSignal::request_failed(method, url, e.error_text.clone()))
                        }
                    };
                    if let Some(signal) = signal {
                        if tx.send(signal).is_err() {
                            break;
                        }
                    }
                }
            });
            Ok(rx)
        }

        async fn close(&mut self) -> HarnessResult<()> {
            if let Some(page) = self.page.take() {
                page.close().await.map_err(cdp_error)?;
            }
            if let Some(id) = self.context_id.take() {
                let browser = self.browser.lock().await;
                browser
                    .dispose_browser_context(id)
                    .await
                    .map_err(cdp_error)?;
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_probe_script_escapes_selector() {
            let script = probe_script(r#"a[title="x"]"#).unwrap();
            assert!(script.contains(r#""a[title=\"x\"]""#));
        }

        #[test]
        fn test_metrics_override_pins_screen_size() {
            let params = metrics_override(Viewport::new(375, 667), 2.0, true).unwrap();
            assert_eq!(params.width, 375);
            assert_eq!(params.screen_width, Some(375));
            assert_eq!(params.screen_height, Some(667));
            assert!(params.mobile);
            assert!(VIEWPORT_SCRIPT.contains("screen.width"));
        }

        #[test]
        fn test_probe_reply_defaults() {
            let reply: ProbeReply = serde_json::from_str(r#"{"error":"bad"}"#).unwrap();
            assert_eq!(reply.visible, -1);
            assert_eq!(reply.matches, 0);
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{CdpBrowser, CdpContext};
