//! Shared types used across Adscope.
//!
//! Newtypes and enums that give the scrape request, job identifiers and
//! element locators a single definition for every crate.

use crate::error::AdscopeError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Newtype for scrape job identifiers.
///
/// Job IDs are UUID v4 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Create a new `JobId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self, AdscopeError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `JobId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used to keep generated file names short.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..8]
    }

    fn validate(id: &str) -> Result<(), AdscopeError> {
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(AdscopeError::Validation(format!(
                "invalid job ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = AdscopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// How the browser window is rendered for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// No visible window
    #[default]
    Headless,
    /// Regular desktop window, useful when debugging selectors
    Visible,
}

impl RenderMode {
    /// Map the wire-level `headless` flag onto a render mode.
    #[must_use]
    pub fn from_headless(headless: bool) -> Self {
        if headless {
            Self::Headless
        } else {
            Self::Visible
        }
    }

    #[must_use]
    pub fn is_headless(self) -> bool {
        matches!(self, Self::Headless)
    }
}

/// How to find an element on the page.
///
/// Locators are plain data so page selectors can live in configuration.
/// XPath expressions starting with `.` are evaluated relative to the scope
/// element they are resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locator {
    /// CSS selector
    #[serde(rename = "css")]
    Css(String),
    /// XPath 1.0 expression
    #[serde(rename = "xpath")]
    XPath(String),
}

impl Locator {
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    /// The raw selector or expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css:{s}"),
            Self::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// A request to scrape one ad-library page.
///
/// Immutable once built; the JSON form mirrors the submission body
/// (`url`, `headless`, `output_file`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScrapeRequestBody", into = "ScrapeRequestBody")]
pub struct ScrapeRequest {
    target_url: String,
    render_mode: RenderMode,
    output_path: Option<PathBuf>,
}

impl ScrapeRequest {
    /// Build a request for `target_url`, rendered headless, with no explicit
    /// output path.
    ///
    /// # Errors
    /// Returns `AdscopeError::Validation` unless the URL is absolute http(s).
    pub fn new(target_url: impl Into<String>) -> Result<Self, AdscopeError> {
        let target_url = target_url.into();
        Self::validate_url(&target_url)?;
        Ok(Self {
            target_url,
            render_mode: RenderMode::Headless,
            output_path: None,
        })
    }

    #[must_use]
    pub fn with_render_mode(mut self, render_mode: RenderMode) -> Self {
        self.render_mode = render_mode;
        self
    }

    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    #[must_use]
    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    #[must_use]
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    fn validate_url(target_url: &str) -> Result<(), AdscopeError> {
        if target_url.trim().is_empty() {
            return Err(AdscopeError::Validation("URL is required".to_string()));
        }

        let parsed = url::Url::parse(target_url)
            .map_err(|e| AdscopeError::Validation(format!("invalid URL '{target_url}': {e}")))?;

        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(AdscopeError::Validation(format!(
                "unsupported URL scheme '{other}', expected http or https"
            ))),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ScrapeRequestBody {
    url: String,
    #[serde(default = "default_headless")]
    headless: bool,
    #[serde(default)]
    output_file: Option<PathBuf>,
}

fn default_headless() -> bool {
    true
}

impl TryFrom<ScrapeRequestBody> for ScrapeRequest {
    type Error = AdscopeError;

    fn try_from(body: ScrapeRequestBody) -> Result<Self, Self::Error> {
        let mut request =
            Self::new(body.url)?.with_render_mode(RenderMode::from_headless(body.headless));
        request.output_path = body.output_file;
        Ok(request)
    }
}

impl From<ScrapeRequest> for ScrapeRequestBody {
    fn from(request: ScrapeRequest) -> Self {
        Self {
            url: request.target_url,
            headless: request.render_mode.is_headless(),
            output_file: request.output_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_valid() {
        let id = "550e8400-e29b-41d4-a716-446655440000";
        let job_id = JobId::new(id).expect("valid job ID");
        assert_eq!(job_id.as_str(), id);
        assert_eq!(job_id.short(), "550e8400");
    }

    #[test]
    fn test_job_id_invalid() {
        let invalid_ids = vec![
            "not-a-uuid",
            "550e8400-e29b-51d4-a716-446655440000", // Wrong version
            "550e8400-e29b-41d4-x716-446655440000", // Invalid hex
            "",
        ];

        for id in invalid_ids {
            assert!(JobId::new(id).is_err(), "Should fail for: {id}");
        }
    }

    #[test]
    fn test_job_id_generate_unique() {
        let id1 = JobId::generate();
        let id2 = JobId::generate();
        assert_ne!(id1, id2);
        assert!(JobId::new(id1.as_str()).is_ok());
    }

    #[test]
    fn test_job_id_deserialize_validates() {
        let ok: Result<JobId, _> = serde_json::from_str("\"550e8400-e29b-41d4-a716-446655440000\"");
        assert!(ok.is_ok());

        let bad: Result<JobId, _> = serde_json::from_str("\"job-1\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_render_mode_from_headless() {
        assert_eq!(RenderMode::from_headless(true), RenderMode::Headless);
        assert_eq!(RenderMode::from_headless(false), RenderMode::Visible);
        assert!(RenderMode::default().is_headless());
    }

    #[test]
    fn test_locator_serialization() {
        let locator = Locator::xpath(".//video");
        let json = serde_json::to_string(&locator).expect("serialize locator");
        assert_eq!(json, r#"{"xpath":".//video"}"#);

        let parsed: Locator = serde_json::from_str(r#"{"css":"div.card"}"#).expect("parse");
        assert_eq!(parsed, Locator::css("div.card"));
        assert_eq!(parsed.expression(), "div.card");
    }

    #[test]
    fn test_scrape_request_validation() {
        assert!(ScrapeRequest::new("https://www.facebook.com/ads/library/?id=1").is_ok());
        assert!(ScrapeRequest::new("").is_err());
        assert!(ScrapeRequest::new("not a url").is_err());
        assert!(ScrapeRequest::new("ftp://example.com/file").is_err());
    }

    #[test]
    fn test_scrape_request_body_defaults() {
        let request: ScrapeRequest =
            serde_json::from_str(r#"{"url": "https://example.com/ads"}"#).expect("parse body");
        assert_eq!(request.target_url(), "https://example.com/ads");
        assert_eq!(request.render_mode(), RenderMode::Headless);
        assert!(request.output_path().is_none());
    }

    #[test]
    fn test_scrape_request_body_round_trip() {
        let request = ScrapeRequest::new("https://example.com/ads")
            .expect("valid request")
            .with_render_mode(RenderMode::Visible)
            .with_output_path("run.json");

        let json = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(json["headless"], false);
        assert_eq!(json["output_file"], "run.json");

        let parsed: ScrapeRequest = serde_json::from_value(json).expect("parse request");
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_scrape_request_body_rejects_bad_url() {
        let result: Result<ScrapeRequest, _> = serde_json::from_str(r#"{"url": ""}"#);
        assert!(result.is_err());
    }
}
