//! In-memory site description: pages, elements and click reactions.

use crate::context::PageSignal;
use std::time::Duration;

/// An element in the mock DOM
#[derive(Debug, Clone, PartialEq)]
pub struct MockElement {
    /// Every selector that matches this element
    pub selectors: Vec<String>,
    /// Whether the element is rendered
    pub visible: bool,
    /// Rendered text
    pub text: String,
    /// Current input value
    pub value: String,
    /// What happens on click, in order
    pub on_click: Vec<ClickReaction>,
}

impl MockElement {
    /// Visible, empty element matched by `selector`
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selectors: vec![selector.into()],
            visible: true,
            text: String::new(),
            value: String::new(),
            on_click: Vec::new(),
        }
    }

    /// Also match `selector`
    #[must_use]
    pub fn alias(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    /// Start hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Set rendered text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Add a click reaction
    #[must_use]
    pub fn on_click(mut self, reaction: ClickReaction) -> Self {
        self.on_click.push(reaction);
        self
    }

    /// Whether `selector` matches this element
    #[must_use]
    pub fn matches(&self, selector: &str) -> bool {
        self.selectors.iter().any(|s| s == selector)
    }
}

/// Effect of clicking an element
#[derive(Debug, Clone, PartialEq)]
pub enum ClickReaction {
    /// Navigate to a route
    Navigate(String),
    /// Make the element matched by the selector visible
    Reveal(String),
    /// Show `text` in the element matched by the selector
    ShowText {
        /// Target selector
        selector: String,
        /// New text
        text: String,
    },
    /// Emit a signal to subscribers
    Emit(PageSignal),
    /// Check the login form and navigate or show the banner
    SubmitLogin(LoginForm),
    /// Apply a reaction after a delay
    Delayed {
        /// Delay before the reaction
        after: Duration,
        /// Reaction to apply
        reaction: Box<ClickReaction>,
    },
    /// Crash the driver (simulates a bug in a step)
    Panic(String),
}

impl ClickReaction {
    /// Navigate to `route`
    #[must_use]
    pub fn navigate(route: impl Into<String>) -> Self {
        Self::Navigate(route.into())
    }

    /// Reveal `selector`
    #[must_use]
    pub fn reveal(selector: impl Into<String>) -> Self {
        Self::Reveal(selector.into())
    }

    /// Wrap in a delay
    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        Self::Delayed {
            after: delay,
            reaction: Box::new(self),
        }
    }
}

/// Login form wiring for [`ClickReaction::SubmitLogin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Selector of the identifier input
    pub identifier_field: String,
    /// Selector of the secret input
    pub secret_field: String,
    /// Route reached after a successful login
    pub success_route: String,
    /// Selector of the error banner
    pub banner: String,
    /// Banner text on rejection
    pub banner_text: String,
}

impl LoginForm {
    /// Form reading the given fields
    #[must_use]
    pub fn new(identifier_field: impl Into<String>, secret_field: impl Into<String>) -> Self {
        Self {
            identifier_field: identifier_field.into(),
            secret_field: secret_field.into(),
            success_route: "/admin".to_string(),
            banner: ".alert-danger".to_string(),
            banner_text: "Invalid email or password".to_string(),
        }
    }

    /// Route reached after a successful login
    #[must_use]
    pub fn with_success_route(mut self, route: impl Into<String>) -> Self {
        self.success_route = route.into();
        self
    }

    /// Banner selector and rejection text
    #[must_use]
    pub fn with_banner(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.banner = selector.into();
        self.banner_text = text.into();
        self
    }
}

/// A page served at a route
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MockPage {
    /// Route path
    pub route: String,
    /// Elements rendered on load
    pub elements: Vec<MockElement>,
    /// Signals emitted on load
    pub signals: Vec<PageSignal>,
}

impl MockPage {
    /// Empty page at `route`
    #[must_use]
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            ..Self::default()
        }
    }

    /// Add an element
    #[must_use]
    pub fn with_element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Emit a signal when the page loads
    #[must_use]
    pub fn with_signal(mut self, signal: PageSignal) -> Self {
        self.signals.push(signal);
        self
    }
}

/// Very small syntax check standing in for the browser's selector parser
pub(crate) fn selector_error(selector: &str) -> Option<&'static str> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Some("empty selector");
    }
    if trimmed.ends_with(['>', '+', '~', ',']) {
        return Some("dangling combinator");
    }
    let mut depth_square = 0i32;
    let mut depth_paren = 0i32;
    let mut quote: Option<char> = None;
    for c in trimmed.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth_square += 1,
            (None, ']') => depth_square -= 1,
            (None, '(') => depth_paren += 1,
            (None, ')') => depth_paren -= 1,
            _ => {}
        }
        if depth_square < 0 || depth_paren < 0 {
            return Some("unbalanced brackets");
        }
    }
    if quote.is_some() {
        return Some("unterminated string");
    }
    if depth_square != 0 || depth_paren != 0 {
        return Some("unbalanced brackets");
    }
    None
}
