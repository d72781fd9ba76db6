//! Page scripts run through [`BrowserSession::execute`].
//!
//! Each script is a function body. `arguments[0]` is the target element when
//! one is passed.
//!
//! [`BrowserSession::execute`]: crate::actions::BrowserSession::execute

/// Scroll the document to its current bottom.
pub const SCROLL_PAGE_TO_BOTTOM: &str =
    "window.scrollTo(0, document.body.scrollHeight); return null;";

/// Current document height in pixels.
pub const PAGE_SCROLL_HEIGHT: &str = "return document.body.scrollHeight;";

/// Scroll the target element to its own bottom.
pub const SCROLL_ELEMENT_TO_BOTTOM: &str =
    "arguments[0].scrollTop = arguments[0].scrollHeight; return null;";

/// Click the target element from script, bypassing overlap checks.
pub const CLICK_ELEMENT: &str = "arguments[0].click(); return null;";
