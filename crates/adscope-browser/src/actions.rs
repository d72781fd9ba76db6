use crate::error::{BrowserError, Result};
use adscope_core::{Locator, RenderMode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Opaque reference to an element inside one session.
///
/// Handles are only meaningful to the session that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys that can be sent to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Enter,
}

impl Key {
    /// DOM `key` / `code` value.
    pub fn name(self) -> &'static str {
        match self {
            Self::Escape => "Escape",
            Self::Enter => "Enter",
        }
    }

    /// Windows virtual key code.
    pub fn key_code(self) -> i64 {
        match self {
            Self::Escape => 27,
            Self::Enter => 13,
        }
    }
}

/// Browser actions available to the extraction engine.
///
/// One session drives one page. Lookups that find nothing return an empty
/// result rather than an error.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a URL and wait for the load to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Run a script function body; `arguments[0]` is `target` when given
    async fn execute(&self, script: &str, target: Option<&ElementHandle>) -> Result<Value>;

    /// Find every element matching `locator`, inside `scope` or the document
    async fn locate(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>>;

    /// Wait up to `timeout` for `locator` to match anything in the document
    async fn wait_until(&self, locator: &Locator, timeout: Duration) -> Result<bool>;

    /// Click an element
    async fn click(&self, element: &ElementHandle) -> Result<()>;

    /// Send a key press to the focused page
    async fn send_key(&self, key: Key) -> Result<()>;

    /// Rendered text of an element
    async fn text(&self, element: &ElementHandle) -> Result<String>;

    /// Attribute value, `None` when the attribute is absent
    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// Release the page and browser
    async fn close(&self) -> Result<()>;

    /// First element matching `locator`, if any
    async fn locate_first(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Option<ElementHandle>> {
        Ok(self.locate(scope, locator).await?.into_iter().next())
    }
}

/// Creates one isolated session per job.
#[async_trait::async_trait]
pub trait SessionLauncher: Send + Sync + 'static {
    type Session: BrowserSession + 'static;

    async fn launch(&self, mode: RenderMode) -> Result<Self::Session>;
}

/// Read a script result as a pixel height.
pub fn as_height(value: &Value) -> Result<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|h| h.max(0.0) as u64))
        .ok_or_else(|| BrowserError::Script(format!("expected a numeric height, got {value}")))
}
