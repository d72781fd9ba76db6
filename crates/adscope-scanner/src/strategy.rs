//! First-success-wins field extraction.
//!
//! A [`Strategy`] locates one element inside a record, reads what it needs
//! from it into a [`Snapshot`] and parses the snapshot. A [`FallbackChain`]
//! tries its strategies in order and keeps the first non-empty value. A
//! failing strategy never fails the field; it only falls through.

use adscope_browser::{BrowserError, BrowserSession, ElementHandle};
use adscope_core::Locator;
use std::collections::HashMap;

/// What a strategy reads from the element it located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Read {
    /// Rendered text
    Text,
    /// Named attribute
    Attribute(&'static str),
}

/// Values read from one located element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    text: Option<String>,
    attributes: HashMap<&'static str, String>,
}

impl Snapshot {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attributes.insert(name, value.into());
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

type Parser<T> = Box<dyn Fn(&Snapshot) -> Option<T> + Send + Sync>;

/// One way of producing a field value.
pub struct Strategy<T> {
    name: &'static str,
    locator: Locator,
    reads: Vec<Read>,
    parse: Parser<T>,
}

impl<T> Strategy<T> {
    pub fn new(
        name: &'static str,
        locator: Locator,
        reads: Vec<Read>,
        parse: impl Fn(&Snapshot) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            locator,
            reads,
            parse: Box::new(parse),
        }
    }

    /// Parse the element's text.
    pub fn text(
        name: &'static str,
        locator: Locator,
        parse: impl Fn(&str) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, locator, vec![Read::Text], move |snapshot| {
            snapshot.text().and_then(&parse)
        })
    }

    /// Parse one attribute of the element.
    pub fn attribute(
        name: &'static str,
        locator: Locator,
        attribute: &'static str,
        parse: impl Fn(&str) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, locator, vec![Read::Attribute(attribute)], move |snapshot| {
            snapshot.attribute(attribute).and_then(&parse)
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run this strategy against `scope`.
    ///
    /// `Ok(None)` means the element was absent or parsed to nothing.
    pub async fn evaluate<S>(
        &self,
        session: &S,
        scope: &ElementHandle,
    ) -> Result<Option<T>, BrowserError>
    where
        S: BrowserSession + ?Sized,
    {
        let Some(element) = session.locate_first(Some(scope), &self.locator).await? else {
            return Ok(None);
        };

        let mut snapshot = Snapshot::default();
        for read in &self.reads {
            match *read {
                Read::Text => snapshot.text = Some(session.text(&element).await?),
                Read::Attribute(name) => {
                    if let Some(value) = session.attribute(&element, name).await? {
                        snapshot.attributes.insert(name, value);
                    }
                }
            }
        }

        Ok((self.parse)(&snapshot))
    }
}

/// Ordered strategies for one field.
pub struct FallbackChain<T> {
    field: &'static str,
    strategies: Vec<Strategy<T>>,
}

impl<T> FallbackChain<T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    #[must_use]
    pub fn then(mut self, strategy: Strategy<T>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Value of the first strategy that produces one.
    pub async fn first_match<S>(&self, session: &S, scope: &ElementHandle) -> Option<T>
    where
        S: BrowserSession + ?Sized,
    {
        for strategy in &self.strategies {
            match strategy.evaluate(session, scope).await {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => tracing::debug!(
                    field = self.field,
                    strategy = strategy.name,
                    record = %scope,
                    "strategy failed: {}",
                    e
                ),
            }
        }
        None
    }
}

/// Trimmed text, or `None` when blank.
pub fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
