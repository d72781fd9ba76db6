use adscope_browser::BrowserError;
use adscope_core::{AdscopeError, ConfigError};
use adscope_db::DatabaseError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Browser launch failed: {0}")]
    Launch(#[source] BrowserError),

    #[error("Navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("Pagination failed after {iterations} scrolls: {source}")]
    Pagination {
        iterations: u32,
        #[source]
        source: BrowserError,
    },

    #[error("Record has no library identifier")]
    MissingIdentifier,

    #[error("Scrape job not found: {0}")]
    JobNotFound(String),

    #[error("Failed to write result to {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] AdscopeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
