//! In-memory browser driver.
//!
//! A deterministic [`BrowsingContext`](crate::BrowsingContext) for exercising
//! the harness without Chromium: a small DOM of elements (selector aliases,
//! visibility, text, value), routes with login redirects, click reactions
//! and console/network signal emission.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vigia::mock::{ClickReaction, LoginForm, MockContext, MockElement, MockPage};
//!
//! let site = MockContext::new()
//!     .with_protected("/admin")
//!     .with_credentials("agent@crm.test", "hunter2")
//!     .with_page(
//!         MockPage::new("/login")
//!             .with_element(MockElement::new("#email"))
//!             .with_element(MockElement::new("#password"))
//!             .with_element(MockElement::new("button[type=submit]").on_click(
//!                 ClickReaction::SubmitLogin(LoginForm::new("#email", "#password")),
//!             )),
//!     );
//! ```

mod context;
mod site;

pub use context::{MockContext, MockFactory};
pub use site::{ClickReaction, LoginForm, MockElement, MockPage};
