//! Infinite-scroll pagination.
//!
//! The page is scrolled to the bottom until its height stops changing for
//! `max_stuck_iterations` consecutive scrolls, an end-of-list marker shows
//! up, or `max_iterations` scrolls have been made.

use crate::error::{Result, ScrapeError};
use crate::progress::ProgressReporter;
use adscope_browser::{as_height, scripts, BrowserError, BrowserSession};
use adscope_core::{Locator, PaginationConfig};
use std::fmt;

/// Why pagination stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An end-of-list marker was found while the height was unchanged
    EndMarker,
    /// The height stayed the same for too many scrolls in a row
    Stabilized,
    /// The scroll ceiling was reached
    IterationCap,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndMarker => write!(f, "end marker"),
            Self::Stabilized => write!(f, "height stabilized"),
            Self::IterationCap => write!(f, "iteration cap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationOutcome {
    /// Scrolls performed
    pub iterations: u32,
    /// Page height after the last scroll
    pub final_height: u64,
    pub stop: StopReason,
}

pub struct PaginationDriver {
    config: PaginationConfig,
    end_markers: Vec<Locator>,
}

impl PaginationDriver {
    pub fn new(config: PaginationConfig, end_markers: Vec<Locator>) -> Self {
        Self {
            config,
            end_markers,
        }
    }

    /// Scroll until the list is fully loaded.
    ///
    /// # Errors
    /// Returns `ScrapeError::Pagination` if scrolling or reading the page
    /// height fails.
    pub async fn run<S>(&self, session: &S, progress: &ProgressReporter) -> Result<PaginationOutcome>
    where
        S: BrowserSession + ?Sized,
    {
        let mut iterations = 0;
        let fail = |iterations: u32| move |source: BrowserError| ScrapeError::Pagination {
            iterations,
            source,
        };

        let mut last_height = self.page_height(session).await.map_err(fail(iterations))?;
        let mut stuck = 0;

        let stop = loop {
            if iterations >= self.config.max_iterations {
                break StopReason::IterationCap;
            }
            iterations += 1;

            session
                .execute(scripts::SCROLL_PAGE_TO_BOTTOM, None)
                .await
                .map_err(fail(iterations))?;
            tokio::time::sleep(self.config.settle_delay()).await;
            let height = self.page_height(session).await.map_err(fail(iterations))?;
            progress.scrolled(iterations);

            if height != last_height {
                tracing::trace!(iteration = iterations, height, "page grew");
                last_height = height;
                stuck = 0;
                continue;
            }

            if self.end_marker_present(session).await {
                break StopReason::EndMarker;
            }

            stuck += 1;
            tracing::debug!(iteration = iterations, stuck, height, "page height unchanged");
            if stuck >= self.config.max_stuck_iterations {
                break StopReason::Stabilized;
            }
        };

        tracing::info!(
            iterations,
            final_height = last_height,
            stop = %stop,
            "pagination finished"
        );

        Ok(PaginationOutcome {
            iterations,
            final_height: last_height,
            stop,
        })
    }

    async fn page_height<S>(&self, session: &S) -> std::result::Result<u64, BrowserError>
    where
        S: BrowserSession + ?Sized,
    {
        let value = session.execute(scripts::PAGE_SCROLL_HEIGHT, None).await?;
        as_height(&value)
    }

    async fn end_marker_present<S>(&self, session: &S) -> bool
    where
        S: BrowserSession + ?Sized,
    {
        for marker in &self.end_markers {
            match session
                .wait_until(marker, self.config.end_marker_wait())
                .await
            {
                Ok(true) => {
                    tracing::debug!(marker = %marker, "end-of-list marker found");
                    return true;
                }
                Ok(false) => {}
                Err(e) => tracing::debug!(marker = %marker, "end marker lookup failed: {}", e),
            }
        }
        false
    }
}
