//! Expansion of multi-variant listings through their summary overlay.

use crate::fields::{first_integer, Depth, FieldExtractor};
use adscope_browser::{scripts, BrowserError, BrowserSession, ElementHandle, Key};
use adscope_core::{AdRecord, ExpansionConfig, Locator, PageSelectors};

/// What one overlay expansion saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    /// Sub-record count announced by the overlay heading (or the parent's
    /// variant count when the heading was unreadable)
    pub declared: usize,
    /// Overlay items present when scrolling stopped
    pub loaded: usize,
    /// Overlay scrolls performed
    pub attempts: u32,
    /// Variants extracted into `nested_ads`
    pub extracted: usize,
}

pub struct NestedExpander {
    config: ExpansionConfig,
    details_button: Locator,
    scroll_region: Locator,
    declared_count: Locator,
    items: Locator,
}

impl NestedExpander {
    pub fn new(config: ExpansionConfig, selectors: &PageSelectors) -> Self {
        Self {
            config,
            details_button: selectors.details_button.clone(),
            scroll_region: selectors.overlay_scroll_region.clone(),
            declared_count: selectors.overlay_declared_count.clone(),
            items: selectors.overlay_items.clone(),
        }
    }

    /// Open the summary overlay of `record`, extract its variants into
    /// `parent.nested_ads` and close the overlay again.
    ///
    /// Never fails: interaction errors are logged and whatever was extracted
    /// so far stays on the parent.
    pub async fn expand<S>(
        &self,
        session: &S,
        extractor: &FieldExtractor,
        record: &ElementHandle,
        parent: &mut AdRecord,
    ) -> ExpansionReport
    where
        S: BrowserSession + ?Sized,
    {
        let mut report = ExpansionReport::default();
        parent.nested_ads.get_or_insert_with(Default::default);

        let button = match session.locate_first(Some(record), &self.details_button).await {
            Ok(Some(button)) => button,
            Ok(None) => {
                tracing::debug!(library_id = %parent.library_id, "no summary details control");
                return report;
            }
            Err(e) => {
                tracing::warn!(library_id = %parent.library_id, "summary control lookup failed: {}", e);
                return report;
            }
        };

        if let Err(e) = self
            .open_and_extract(session, extractor, &button, parent, &mut report)
            .await
        {
            tracing::warn!(
                library_id = %parent.library_id,
                extracted = report.extracted,
                "overlay expansion interrupted: {}",
                e
            );
        }

        if let Err(e) = session.send_key(Key::Escape).await {
            tracing::warn!(library_id = %parent.library_id, "failed to close overlay: {}", e);
        }
        tokio::time::sleep(self.config.close_delay()).await;

        tracing::debug!(
            library_id = %parent.library_id,
            declared = report.declared,
            loaded = report.loaded,
            attempts = report.attempts,
            extracted = report.extracted,
            "overlay expanded"
        );
        report
    }

    async fn open_and_extract<S>(
        &self,
        session: &S,
        extractor: &FieldExtractor,
        button: &ElementHandle,
        parent: &mut AdRecord,
        report: &mut ExpansionReport,
    ) -> Result<(), BrowserError>
    where
        S: BrowserSession + ?Sized,
    {
        session.click(button).await?;
        tokio::time::sleep(self.config.open_delay()).await;

        report.declared = self.declared_count(session, parent).await;
        let items = self.load_items(session, report).await?;

        for item in items.iter().take(report.declared).skip(1) {
            match extractor.extract(session, item, Depth::Nested).await {
                Ok(variant) => {
                    let nested = parent.nested_ads.get_or_insert_with(Default::default);
                    if nested.insert(variant.library_id.clone(), variant).is_some() {
                        tracing::debug!(
                            library_id = %parent.library_id,
                            "duplicate variant identifier, keeping the latest"
                        );
                    }
                    report.extracted += 1;
                }
                Err(e) => tracing::debug!(
                    library_id = %parent.library_id,
                    item = %item,
                    "skipping variant: {}",
                    e
                ),
            }
        }
        Ok(())
    }

    async fn declared_count<S>(&self, session: &S, parent: &AdRecord) -> usize
    where
        S: BrowserSession + ?Sized,
    {
        let heading = match session.locate_first(None, &self.declared_count).await {
            Ok(Some(heading)) => session.text(&heading).await.ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(library_id = %parent.library_id, "overlay heading lookup failed: {}", e);
                None
            }
        };

        heading
            .as_deref()
            .and_then(first_integer)
            .or(parent.ads_count)
            .map_or(0, |n| n as usize)
    }

    /// Scroll the overlay until `declared` items are present or the attempt
    /// limit is reached. A failing scroll stops scrolling but keeps the
    /// items already loaded.
    async fn load_items<S>(
        &self,
        session: &S,
        report: &mut ExpansionReport,
    ) -> Result<Vec<ElementHandle>, BrowserError>
    where
        S: BrowserSession + ?Sized,
    {
        let mut items = session.locate(None, &self.items).await?;
        let region = session.locate_first(None, &self.scroll_region).await?;

        while items.len() < report.declared && report.attempts < self.config.max_scroll_attempts {
            let Some(region) = &region else {
                tracing::debug!("overlay has no scroll region");
                break;
            };
            report.attempts += 1;
            if let Err(e) = session
                .execute(scripts::SCROLL_ELEMENT_TO_BOTTOM, Some(region))
                .await
            {
                tracing::debug!(attempt = report.attempts, "overlay scroll failed: {}", e);
                break;
            }
            tokio::time::sleep(self.config.scroll_settle()).await;
            items = session.locate(None, &self.items).await?;
        }

        report.loaded = items.len();
        if report.loaded < report.declared {
            tracing::debug!(
                declared = report.declared,
                loaded = report.loaded,
                "overlay did not load every variant"
            );
        }
        Ok(items)
    }
}
