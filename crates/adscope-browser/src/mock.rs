//! In-memory browser session for engine tests.
//!
//! The page is modelled as a map from `(scope, locator)` to child handles,
//! plus texts and attributes per handle. Page scripts from
//! [`crate::scripts`] are interpreted directly; anything else is rejected.

use crate::actions::{BrowserSession, ElementHandle, Key, SessionLauncher};
use crate::error::{BrowserError, Result};
use crate::scripts;
use adscope_core::{Locator, RenderMode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug)]
enum Heights {
    Sequence(Vec<u64>, usize),
    Growing { next: u64, step: u64 },
}

impl Default for Heights {
    fn default() -> Self {
        Self::Sequence(vec![1000], 0)
    }
}

impl Heights {
    fn next(&mut self) -> u64 {
        match self {
            Self::Sequence(heights, cursor) => {
                let idx = (*cursor).min(heights.len().saturating_sub(1));
                *cursor += 1;
                heights.get(idx).copied().unwrap_or_default()
            }
            Self::Growing { next, step } => {
                let height = *next;
                *next += *step;
                height
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Reveal {
    visible: usize,
    step: usize,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    children: HashMap<(Option<ElementHandle>, Locator), Vec<ElementHandle>>,
    texts: HashMap<ElementHandle, String>,
    attributes: HashMap<(ElementHandle, String), String>,
    reveals: HashMap<Locator, Reveal>,
    heights: Heights,

    navigation_delay: Duration,
    fail_navigation: Option<String>,
    panic_on_navigation: Option<String>,
    fail_height_reads: bool,
    fail_element_scrolls: bool,
    failing_locators: Vec<Locator>,

    navigations: Vec<String>,
    clicks: Vec<ElementHandle>,
    keys: Vec<Key>,
    page_scrolls: usize,
    element_scrolls: Vec<ElementHandle>,
    closes: usize,
    closed: bool,
}

/// Scriptable in-memory [`BrowserSession`].
///
/// Clones share state, so a test can keep one clone for inspection while
/// another is handed to the engine.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorders from others.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Create `count` elements matching `locator` inside `scope`.
    pub fn add_children(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
        count: usize,
    ) -> Vec<ElementHandle> {
        let mut state = self.state();
        let created: Vec<ElementHandle> = (0..count)
            .map(|_| {
                state.next_id += 1;
                ElementHandle::new(format!("m{}", state.next_id))
            })
            .collect();
        state
            .children
            .entry((scope.cloned(), locator.clone()))
            .or_default()
            .extend(created.iter().cloned());
        created
    }

    /// Create one element matching `locator` inside `scope`.
    pub fn add_child(&self, scope: Option<&ElementHandle>, locator: &Locator) -> ElementHandle {
        self.add_children(scope, locator, 1).remove(0)
    }

    pub fn set_text(&self, element: &ElementHandle, text: impl Into<String>) {
        self.state().texts.insert(element.clone(), text.into());
    }

    pub fn set_attribute(
        &self,
        element: &ElementHandle,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.state()
            .attributes
            .insert((element.clone(), name.into()), value.into());
    }

    /// Document-level `locator` starts with `initial` matches visible and
    /// reveals `step` more after every element scroll.
    pub fn reveal_progressively(&self, locator: &Locator, initial: usize, step: usize) {
        self.state().reveals.insert(
            locator.clone(),
            Reveal {
                visible: initial,
                step,
            },
        );
    }

    /// Page heights returned by successive height reads; the last repeats.
    pub fn set_page_heights(&self, heights: Vec<u64>) {
        self.state().heights = Heights::Sequence(heights, 0);
    }

    /// Page height grows by `step` on every read and never settles.
    pub fn set_growing_height(&self, start: u64, step: u64) {
        self.state().heights = Heights::Growing { next: start, step };
    }

    pub fn set_navigation_delay(&self, delay: Duration) {
        self.state().navigation_delay = delay;
    }

    pub fn fail_navigation(&self, message: impl Into<String>) {
        self.state().fail_navigation = Some(message.into());
    }

    pub fn panic_on_navigation(&self, message: impl Into<String>) {
        self.state().panic_on_navigation = Some(message.into());
    }

    pub fn fail_height_reads(&self) {
        self.state().fail_height_reads = true;
    }

    pub fn fail_element_scrolls(&self) {
        self.state().fail_element_scrolls = true;
    }

    /// Every lookup with `locator` errors instead of matching.
    pub fn fail_locator(&self, locator: &Locator) {
        self.state().failing_locators.push(locator.clone());
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<ElementHandle> {
        self.state().clicks.clone()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.state().keys.clone()
    }

    pub fn page_scrolls(&self) -> usize {
        self.state().page_scrolls
    }

    pub fn element_scrolls(&self) -> Vec<ElementHandle> {
        self.state().element_scrolls.clone()
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    fn ensure_open(state: &MockState) -> Result<()> {
        if state.closed {
            return Err(BrowserError::SessionClosed);
        }
        Ok(())
    }

    fn require_target(target: Option<&ElementHandle>) -> Result<&ElementHandle> {
        target.ok_or_else(|| BrowserError::Script("script requires a target element".to_string()))
    }
}

#[async_trait::async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let (delay, failure, panic_message) = {
            let mut state = self.state();
            Self::ensure_open(&state)?;
            state.navigations.push(url.to_string());
            (
                state.navigation_delay,
                state.fail_navigation.clone(),
                state.panic_on_navigation.clone(),
            )
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = panic_message {
            panic!("{message}");
        }
        match failure {
            Some(message) => Err(BrowserError::NavigationError(message)),
            None => Ok(()),
        }
    }

    async fn execute(&self, script: &str, target: Option<&ElementHandle>) -> Result<Value> {
        let mut state = self.state();
        Self::ensure_open(&state)?;
        match script {
            scripts::SCROLL_PAGE_TO_BOTTOM => {
                state.page_scrolls += 1;
                Ok(Value::Null)
            }
            scripts::PAGE_SCROLL_HEIGHT => {
                if state.fail_height_reads {
                    return Err(BrowserError::Script("height read failed".to_string()));
                }
                Ok(json!(state.heights.next()))
            }
            scripts::SCROLL_ELEMENT_TO_BOTTOM => {
                let target = Self::require_target(target)?;
                if state.fail_element_scrolls {
                    return Err(BrowserError::Script("element scroll failed".to_string()));
                }
                state.element_scrolls.push(target.clone());
                for reveal in state.reveals.values_mut() {
                    reveal.visible += reveal.step;
                }
                Ok(Value::Null)
            }
            scripts::CLICK_ELEMENT => {
                let target = Self::require_target(target)?;
                state.clicks.push(target.clone());
                Ok(Value::Null)
            }
            other => Err(BrowserError::Script(format!("unsupported script: {other}"))),
        }
    }

    async fn locate(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>> {
        let state = self.state();
        Self::ensure_open(&state)?;
        if state.failing_locators.contains(locator) {
            return Err(BrowserError::Script(format!("lookup failed for {locator}")));
        }

        let matches = state
            .children
            .get(&(scope.cloned(), locator.clone()))
            .cloned()
            .unwrap_or_default();

        match (scope, state.reveals.get(locator)) {
            (None, Some(reveal)) => Ok(matches.into_iter().take(reveal.visible).collect()),
            _ => Ok(matches),
        }
    }

    async fn wait_until(&self, locator: &Locator, _timeout: Duration) -> Result<bool> {
        Ok(!self.locate(None, locator).await?.is_empty())
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.execute(scripts::CLICK_ELEMENT, Some(element))
            .await
            .map(|_| ())
    }

    async fn send_key(&self, key: Key) -> Result<()> {
        let mut state = self.state();
        Self::ensure_open(&state)?;
        state.keys.push(key);
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        let state = self.state();
        Self::ensure_open(&state)?;
        Ok(state.texts.get(element).cloned().unwrap_or_default())
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let state = self.state();
        Self::ensure_open(&state)?;
        Ok(state
            .attributes
            .get(&(element.clone(), name.to_string()))
            .cloned())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state();
        state.closes += 1;
        state.closed = true;
        Ok(())
    }
}

/// Hands out clones of one [`MockSession`].
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    session: MockSession,
    fail_launch: Option<String>,
    launches: Arc<Mutex<Vec<RenderMode>>>,
}

impl MockLauncher {
    pub fn new(session: MockSession) -> Self {
        Self {
            session,
            fail_launch: None,
            launches: Arc::default(),
        }
    }

    /// A launcher whose every launch fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_launch: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn session(&self) -> &MockSession {
        &self.session
    }

    /// Render modes of every launch so far.
    pub fn launches(&self) -> Vec<RenderMode> {
        self.launches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl SessionLauncher for MockLauncher {
    type Session = MockSession;

    async fn launch(&self, mode: RenderMode) -> Result<MockSession> {
        self.launches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(mode);
        match &self.fail_launch {
            Some(message) => Err(BrowserError::ChromiumError(message.clone())),
            None => {
                // Each launch starts from an open page.
                self.session.state().closed = false;
                Ok(self.session.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::as_height;

    #[tokio::test]
    async fn test_scoped_lookup() {
        let session = MockSession::new();
        let groups = Locator::css("div.group");
        let records = Locator::xpath("./div");

        let group = session.add_child(None, &groups);
        let children = session.add_children(Some(&group), &records, 2);

        assert_eq!(session.locate(None, &groups).await.unwrap(), vec![group.clone()]);
        assert_eq!(session.locate(Some(&group), &records).await.unwrap(), children);
        // Same locator at document scope matches nothing.
        assert!(session.locate(None, &records).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_height_sequence_repeats_last() {
        let session = MockSession::new();
        session.set_page_heights(vec![100, 200]);

        let mut seen = Vec::new();
        for _ in 0..4 {
            let value = session
                .execute(scripts::PAGE_SCROLL_HEIGHT, None)
                .await
                .unwrap();
            seen.push(as_height(&value).unwrap());
        }
        assert_eq!(seen, vec![100, 200, 200, 200]);
    }

    #[tokio::test]
    async fn test_progressive_reveal() {
        let session = MockSession::new();
        let items = Locator::xpath("/html/body//item");
        let region = session.add_child(None, &Locator::xpath("/html/body/region"));
        session.add_children(None, &items, 5);
        session.reveal_progressively(&items, 2, 2);

        assert_eq!(session.locate(None, &items).await.unwrap().len(), 2);
        session
            .execute(scripts::SCROLL_ELEMENT_TO_BOTTOM, Some(&region))
            .await
            .unwrap();
        assert_eq!(session.locate(None, &items).await.unwrap().len(), 4);
        session
            .execute(scripts::SCROLL_ELEMENT_TO_BOTTOM, Some(&region))
            .await
            .unwrap();
        assert_eq!(session.locate(None, &items).await.unwrap().len(), 5);
        assert_eq!(session.element_scrolls().len(), 2);
    }

    #[test]
    fn test_unknown_script_rejected() {
        let session = MockSession::new();
        tokio_test::assert_err!(tokio_test::block_on(session.execute("return 1;", None)));
    }

    #[tokio::test]
    async fn test_closed_session_rejects_actions() {
        let session = MockSession::new();
        let groups = Locator::css("div.group");
        let group = session.add_child(None, &groups);

        session.close().await.unwrap();

        assert!(matches!(
            session.locate(None, &groups).await,
            Err(BrowserError::SessionClosed)
        ));
        assert!(matches!(
            session.navigate("https://example.com").await,
            Err(BrowserError::SessionClosed)
        ));
        assert!(matches!(
            session.text(&group).await,
            Err(BrowserError::SessionClosed)
        ));
        assert!(session.navigations().is_empty());
        assert_eq!(session.closes(), 1);
    }

    #[tokio::test]
    async fn test_relaunch_reopens_session() {
        let launcher = MockLauncher::new(MockSession::new());
        let first = launcher.launch(RenderMode::Headless).await.unwrap();
        first.close().await.unwrap();

        let second = launcher.launch(RenderMode::Headless).await.unwrap();
        second.navigate("https://example.com").await.unwrap();
        assert_eq!(launcher.session().navigations(), vec!["https://example.com"]);
    }

    #[tokio::test]
    async fn test_launcher_shares_state() {
        let launcher = MockLauncher::new(MockSession::new());
        let session = launcher.launch(RenderMode::Visible).await.unwrap();
        session.send_key(Key::Escape).await.unwrap();

        assert_eq!(launcher.session().keys(), vec![Key::Escape]);
        assert_eq!(launcher.launches(), vec![RenderMode::Visible]);
        assert!(MockLauncher::failing("no chrome")
            .launch(RenderMode::Headless)
            .await
            .is_err());
    }
}
