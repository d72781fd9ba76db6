//! The extraction routine run inside one browser session.

use crate::egress::EgressResolver;
use crate::error::{Result, ScrapeError};
use crate::fields::{Depth, FieldExtractor};
use crate::locator::RecordLocator;
use crate::nested::NestedExpander;
use crate::pagination::PaginationDriver;
use crate::progress::ProgressReporter;
use adscope_browser::BrowserSession;
use adscope_core::{
    AppConfig, Locator, PaginationConfig, ScrapePhase, ScrapeRequest, ScrapeResult,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Records between "still extracting" log lines.
const LOG_EVERY: u64 = 50;

/// Scrolls, locates and extracts every listing on one Ads Library page.
pub struct Scraper {
    pagination: PaginationConfig,
    initial_content: Locator,
    initial_content_timeout: Duration,
    driver: PaginationDriver,
    locator: RecordLocator,
    extractor: FieldExtractor,
    expander: NestedExpander,
    egress: Arc<dyn EgressResolver>,
}

impl Scraper {
    /// Build the routine from configuration; `egress` is queried at the
    /// start and end of every run.
    pub fn new(config: &AppConfig, egress: Arc<dyn EgressResolver>) -> Self {
        let selectors = &config.selectors;

        Self {
            pagination: config.pagination.clone(),
            initial_content: selectors.initial_content.clone(),
            initial_content_timeout: config.browser.initial_content_timeout(),
            driver: PaginationDriver::new(config.pagination.clone(), selectors.end_markers.clone()),
            locator: RecordLocator::new(selectors),
            extractor: FieldExtractor::new(selectors, config.icon_tables()),
            expander: NestedExpander::new(config.expansion.clone(), selectors),
            egress,
        }
    }

    /// Scrape `request.target_url()` in `session`.
    ///
    /// A pagination failure is reported inside the returned result's
    /// `error`; only navigation failures are returned as errors.
    ///
    /// # Errors
    /// Returns `ScrapeError::Navigation` if the page cannot be loaded.
    pub async fn run<S>(
        &self,
        session: &S,
        request: &ScrapeRequest,
        progress: &ProgressReporter,
    ) -> Result<ScrapeResult>
    where
        S: BrowserSession + ?Sized,
    {
        let started = Instant::now();
        let starting_ip = self.egress.current_ip().await;
        tracing::info!(url = request.target_url(), %starting_ip, "starting scrape");

        progress.phase(ScrapePhase::Navigating);
        session
            .navigate(request.target_url())
            .await
            .map_err(|source| ScrapeError::Navigation {
                url: request.target_url().to_string(),
                source,
            })?;

        match session
            .wait_until(&self.initial_content, self.initial_content_timeout)
            .await
        {
            Ok(true) => tracing::debug!("initial content rendered"),
            Ok(false) => tracing::warn!(
                timeout_secs = self.initial_content_timeout.as_secs(),
                "timed out waiting for initial content, continuing"
            ),
            Err(e) => tracing::warn!("initial content wait failed, continuing: {}", e),
        }

        progress.phase(ScrapePhase::Paginating);
        if let Err(e) = self.driver.run(session, progress).await {
            tracing::error!("pagination aborted: {}", e);
            let ending_ip = self.egress.current_ip().await;
            return Ok(ScrapeResult::failed(
                e.to_string(),
                started.elapsed(),
                starting_ip,
                ending_ip,
            ));
        }

        tokio::time::sleep(self.pagination.final_render_delay()).await;

        progress.phase(ScrapePhase::Extracting);
        let mut result = ScrapeResult::new(starting_ip);
        let records = self.locator.all_records(session).await;
        result.add_found(records.len());
        progress.found(result.total_ads_found);

        let depth = Depth::TopLevel;
        for (index, record) in records.iter().enumerate() {
            match self.extractor.extract(session, record, depth).await {
                Ok(mut ad) => {
                    if depth.can_expand() && ad.has_variants() {
                        self.expander
                            .expand(session, &self.extractor, record, &mut ad)
                            .await;
                    }
                    let library_id = ad.library_id.clone();
                    if result.upsert(ad).is_some() {
                        tracing::debug!(%library_id, "duplicate library identifier, keeping the latest");
                    }
                }
                Err(e) => tracing::debug!(record = %record, "skipping record: {}", e),
            }

            let done = index as u64 + 1;
            progress.processed(result.total_ads_processed());
            if done % LOG_EVERY == 0 {
                tracing::info!(
                    done,
                    total = result.total_ads_found,
                    extracted = result.total_ads_processed(),
                    "extraction progress"
                );
            }
        }

        let ending_ip = self.egress.current_ip().await;
        let result = result.finish(started.elapsed(), ending_ip);
        tracing::info!(
            found = result.total_ads_found,
            extracted = result.total_ads_processed(),
            seconds = result.scraping_time,
            "scrape finished"
        );
        Ok(result)
    }
}
