use crate::actions::{BrowserSession, ElementHandle, Key, SessionLauncher};
use crate::error::{BrowserError, Result};
use adscope_core::{BrowserConfig, Locator, RenderMode};
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Attribute used to tag located elements so later calls can find them again.
pub const HANDLE_ATTRIBUTE: &str = "data-adscope-handle";

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches a fresh Chromium process per session.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn chrome_config(&self, mode: RenderMode) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .window_size(self.config.window_width, self.config.window_height)
            .request_timeout(self.config.navigation_timeout())
            .arg("--disable-gpu")
            .arg("--log-level=3");

        if self.config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if !mode.is_headless() {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.config.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(BrowserError::ChromiumError)
    }
}

#[async_trait::async_trait]
impl SessionLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self, mode: RenderMode) -> Result<ChromiumSession> {
        let config = self.chrome_config(mode)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("browser handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(BrowserError::ChromiumError(e.to_string()));
            }
        };

        tracing::debug!(?mode, "launched chromium session");

        Ok(ChromiumSession {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task,
            navigation_timeout: self.config.navigation_timeout(),
        })
    }
}

/// One Chromium process driving a single page.
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumSession {
    async fn ensure_open(&self) -> Result<()> {
        if self.browser.lock().await.is_none() {
            return Err(BrowserError::SessionClosed);
        }
        Ok(())
    }

    async fn evaluate(&self, expression: String) -> Result<Value> {
        self.ensure_open().await?;
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

#[async_trait::async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open().await?;
        tokio::time::timeout(self.navigation_timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserError::Timeout(format!("navigation to {url}")))?
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
        Ok(())
    }

    async fn execute(&self, script: &str, target: Option<&ElementHandle>) -> Result<Value> {
        let envelope = self.evaluate(envelope_script(script, target)).await?;
        unwrap_envelope(envelope, target)
    }

    async fn locate(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>> {
        let value = self.evaluate(locate_script(scope, locator)).await?;
        parse_located(value, scope)
    }

    async fn wait_until(&self, locator: &Locator, timeout: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.locate(None, locator).await?.is_empty() {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.execute(crate::scripts::CLICK_ELEMENT, Some(element))
            .await
            .map(|_| ())
    }

    async fn send_key(&self, key: Key) -> Result<()> {
        self.ensure_open().await?;
        for event_type in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let params = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(key.name())
                .code(key.name())
                .windows_virtual_key_code(key.key_code())
                .build()
                .map_err(BrowserError::ChromiumError)?;
            self.page
                .execute(params)
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        }
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        let value = self
            .execute(
                "const el = arguments[0]; return el.innerText ?? el.textContent ?? '';",
                Some(element),
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let script = format!("return arguments[0].getAttribute({});", js_string(name));
        let value = self.execute(&script, Some(element)).await?;
        Ok(value.as_str().map(ToString::to_string))
    }

    async fn close(&self) -> Result<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = browser.close().await {
            tracing::warn!("failed to close browser cleanly: {}", e);
        }
        if let Err(e) = browser.wait().await {
            tracing::warn!("failed to reap browser process: {}", e);
        }
        self.handler_task.abort();
        tracing::debug!("closed chromium session");
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// Quote `s` as a JavaScript string literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Expression resolving a handle back to its element, or `null`.
fn resolve_expression(handle: &ElementHandle) -> String {
    let selector = format!("[{HANDLE_ATTRIBUTE}={}]", js_string(handle.as_str()));
    format!("document.querySelector({})", js_string(&selector))
}

fn scope_expression(scope: Option<&ElementHandle>) -> String {
    scope.map_or_else(|| "document".to_string(), resolve_expression)
}

/// Script that tags every match of `locator` and returns
/// `{ "stale": bool, "handles": [...] }`.
fn locate_script(scope: Option<&ElementHandle>, locator: &Locator) -> String {
    let query = match locator {
        Locator::XPath(expression) => format!(
            "const snap = document.evaluate({}, scope, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
             for (let i = 0; i < snap.snapshotLength; i++) nodes.push(snap.snapshotItem(i));",
            js_string(expression)
        ),
        Locator::Css(selector) => format!(
            "nodes.push(...scope.querySelectorAll({}));",
            js_string(selector)
        ),
    };

    format!(
        "(() => {{ \
           const scope = {scope}; \
           if (scope === null) return {{ stale: true, handles: [] }}; \
           const nodes = []; \
           {query} \
           window.__adscopeNext = window.__adscopeNext || 0; \
           const handles = nodes.filter(n => n.nodeType === 1).map(n => {{ \
             let h = n.getAttribute({attr}); \
             if (!h) {{ h = 'h' + (++window.__adscopeNext); n.setAttribute({attr}, h); }} \
             return h; \
           }}); \
           return {{ stale: false, handles }}; \
         }})()",
        scope = scope_expression(scope),
        attr = js_string(HANDLE_ATTRIBUTE),
    )
}

/// Wrap a script body so it runs with the target as `arguments[0]` and
/// returns `{ "stale": bool, "value": ... }`.
fn envelope_script(script: &str, target: Option<&ElementHandle>) -> String {
    match target {
        Some(handle) => format!(
            "(() => {{ \
               const target = {}; \
               if (target === null) return {{ stale: true }}; \
               return {{ stale: false, value: (function() {{ {script} }}).call(null, target) }}; \
             }})()",
            resolve_expression(handle)
        ),
        None => format!(
            "(() => ({{ stale: false, value: (function() {{ {script} }}).call(null) }}))()"
        ),
    }
}

fn is_stale(value: &Value) -> bool {
    value.get("stale").and_then(Value::as_bool).unwrap_or(false)
}

fn parse_located(value: Value, scope: Option<&ElementHandle>) -> Result<Vec<ElementHandle>> {
    if is_stale(&value) {
        return Err(stale(scope));
    }
    let handles = value
        .get("handles")
        .and_then(Value::as_array)
        .ok_or_else(|| BrowserError::Script(format!("unexpected locate result: {value}")))?;

    Ok(handles
        .iter()
        .filter_map(Value::as_str)
        .map(ElementHandle::new)
        .collect())
}

fn unwrap_envelope(mut value: Value, target: Option<&ElementHandle>) -> Result<Value> {
    if is_stale(&value) {
        return Err(stale(target));
    }
    Ok(value
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

fn stale(handle: Option<&ElementHandle>) -> BrowserError {
    BrowserError::StaleElement(handle.map_or_else(String::new, ToString::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
        assert_eq!(js_string("Library ID:"), r#""Library ID:""#);
    }

    #[test]
    fn test_resolve_expression_uses_handle_attribute() {
        let expr = resolve_expression(&ElementHandle::new("h7"));
        assert!(expr.starts_with("document.querySelector("));
        assert!(expr.contains("data-adscope-handle"));
        assert!(expr.contains("h7"));
    }

    #[test]
    fn test_locate_script_xpath_scoped() {
        let scope = ElementHandle::new("h1");
        let script = locate_script(
            Some(&scope),
            &Locator::xpath(r#".//span[contains(text(), "Library ID:")]"#),
        );
        assert!(script.contains("document.evaluate("));
        assert!(script.contains(r#"\"Library ID:\""#));
        assert!(script.contains("h1"));
        assert!(!script.contains("querySelectorAll"));
    }

    #[test]
    fn test_locate_script_css_document() {
        let script = locate_script(None, &Locator::css("div.card"));
        assert!(script.contains("const scope = document;"));
        assert!(script.contains(r#"querySelectorAll("div.card")"#));
    }

    #[test]
    fn test_envelope_without_target() {
        let script = envelope_script(crate::scripts::PAGE_SCROLL_HEIGHT, None);
        assert!(script.contains("return document.body.scrollHeight;"));
        assert!(!script.contains("querySelector"));
    }

    #[test]
    fn test_parse_located() {
        let handles = parse_located(json!({"stale": false, "handles": ["h1", "h2"]}), None)
            .expect("parse handles");
        assert_eq!(handles, vec![ElementHandle::new("h1"), ElementHandle::new("h2")]);

        let scope = ElementHandle::new("h9");
        let err = parse_located(json!({"stale": true, "handles": []}), Some(&scope))
            .expect_err("stale scope");
        assert!(matches!(err, BrowserError::StaleElement(h) if h == "h9"));
    }

    #[test]
    fn test_unwrap_envelope() {
        let value = unwrap_envelope(json!({"stale": false, "value": 1200}), None).unwrap();
        assert_eq!(value, json!(1200));

        // `undefined` results drop the key entirely.
        let value = unwrap_envelope(json!({"stale": false}), None).unwrap();
        assert!(value.is_null());

        let target = ElementHandle::new("h3");
        assert!(unwrap_envelope(json!({"stale": true}), Some(&target)).is_err());
    }
}
