//! Adscope Core - Foundation crate for the Adscope ad-library scraper.
//!
//! This crate provides the shared data model, error handling, configuration
//! management and page selectors that all other Adscope crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`JobId`, `RenderMode`, `Locator`, `ScrapeRequest`)
//! - [`record`] - Scraped ad records and the per-job result document
//! - [`progress`] - Progress metadata for running jobs
//! - [`icons`] - Platform and category icon lookup tables
//! - [`selectors`] - Configurable page locators
//!
//! # Example
//!
//! ```rust
//! use adscope_core::{AppConfig, ScrapeRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let request = ScrapeRequest::new("https://www.facebook.com/ads/library/?id=1")?;
//!
//! assert!(request.render_mode().is_headless());
//! assert_eq!(config.pagination.max_stuck_iterations, 3);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod icons;
pub mod progress;
pub mod record;
pub mod selectors;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, EgressConfig, ExpansionConfig, JobsConfig, PaginationConfig,
};
pub use error::{AdscopeError, ConfigError, ConfigResult, Result};
pub use icons::{IconConfig, IconKey, IconMapping, IconTable, IconTables, UNKNOWN_CATEGORY};
pub use progress::{ScrapePhase, ScrapeProgress};
pub use record::{AdRecord, MediaDescriptor, MediaKind, ScrapeResult};
pub use selectors::PageSelectors;
pub use types::{JobId, Locator, RenderMode, ScrapeRequest};
