//! Adscope Scanner - Ads Library extraction engine and job orchestration.
//!
//! A scrape scrolls the listing until it stops growing, walks every record
//! container, extracts each field through its own fallback chain and opens
//! the summary overlay of multi-variant listings. The orchestrator runs
//! scrapes as background jobs with a persisted lifecycle.
//!
//! # Example
//!
//! ```rust,ignore
//! use adscope_browser::ChromiumLauncher;
//! use adscope_scanner::ScrapeOrchestrator;
//!
//! let launcher = ChromiumLauncher::new(config.browser.clone());
//! let orchestrator = ScrapeOrchestrator::from_config(launcher, db, &config)?;
//!
//! let job_id = orchestrator.submit(ScrapeRequest::new(url)?).await?;
//! let status = orchestrator.poll(job_id.as_str()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

#[allow(missing_docs)]
pub mod egress;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod fields;
#[allow(missing_docs)]
pub mod locator;
#[allow(missing_docs)]
pub mod nested;
pub mod orchestrator;
pub mod output;
#[allow(missing_docs)]
pub mod pagination;
#[allow(missing_docs)]
pub mod progress;
pub mod scraper;
#[allow(missing_docs)]
pub mod strategy;

// Re-export commonly used types
pub use egress::{DisabledEgress, EgressResolver, IpifyResolver};
pub use error::{Result, ScrapeError};
pub use fields::{Depth, FieldExtractor};
pub use locator::RecordLocator;
pub use nested::{ExpansionReport, NestedExpander};
pub use orchestrator::{JobStatus, ScrapeOrchestrator};
pub use pagination::{PaginationDriver, PaginationOutcome, StopReason};
pub use progress::ProgressReporter;
pub use scraper::Scraper;
pub use strategy::{FallbackChain, Strategy};
