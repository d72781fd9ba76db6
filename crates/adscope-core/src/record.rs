//! Scraped ad records and the per-job result document.
//!
//! The serialized shape of [`ScrapeResult`] is the persisted artifact: one
//! JSON document per job, with every absent field written as an explicit
//! `null`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of creative attached to an ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A `<video>` element, optionally with a poster frame
    Video,
    /// An `<img>` element
    Image,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Media found in an ad. All fields are `None` when no media matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Type tag set by whichever strategy matched
    #[serde(rename = "media_type")]
    pub kind: Option<MediaKind>,
    /// Video or image source URL
    #[serde(rename = "media_url")]
    pub url: Option<String>,
    /// Poster image for videos
    #[serde(rename = "thumbnail_url")]
    pub thumbnail: Option<String>,
}

impl MediaDescriptor {
    /// A video with an optional poster frame.
    #[must_use]
    pub fn video(url: impl Into<String>, thumbnail: Option<String>) -> Self {
        Self {
            kind: Some(MediaKind::Video),
            url: Some(url.into()),
            thumbnail,
        }
    }

    /// An image; images never carry a thumbnail.
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: Some(MediaKind::Image),
            url: Some(url.into()),
            thumbnail: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.url.is_none()
    }
}

/// One ad-library listing, or a nested variant of one.
///
/// `nested_ads` is only serialized when the listing declared more than one
/// variant. Nested records never carry their own `nested_ads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    /// Library identifier, unique within a result
    pub library_id: String,
    /// First day the ad ran, `YYYY-MM-DD`
    pub started_running: Option<String>,
    /// Free-text active duration, e.g. "3 hrs"
    pub total_active_time: Option<String>,
    /// Platform names resolved from icons
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Category names resolved from icons
    #[serde(default)]
    pub categories: Vec<String>,
    /// Number of ads sharing this creative
    pub ads_count: Option<u32>,
    /// Body text of the ad
    pub ad_text: Option<String>,
    /// Landing page after unwrapping the redirect link
    pub destination_url: Option<String>,
    /// Video or image creative
    #[serde(flatten)]
    pub media: MediaDescriptor,
    /// Call-to-action button label
    pub cta_button_text: Option<String>,
    /// Variants revealed in the summary overlay, keyed by library identifier
    /// in overlay order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_ads: Option<IndexMap<String, AdRecord>>,
}

impl AdRecord {
    /// A record with only its identifier set.
    #[must_use]
    pub fn new(library_id: impl Into<String>) -> Self {
        Self {
            library_id: library_id.into(),
            started_running: None,
            total_active_time: None,
            platforms: Vec::new(),
            categories: Vec::new(),
            ads_count: None,
            ad_text: None,
            destination_url: None,
            media: MediaDescriptor::default(),
            cta_button_text: None,
            nested_ads: None,
        }
    }

    /// Whether this record declared more than one variant.
    #[must_use]
    pub fn has_variants(&self) -> bool {
        self.ads_count.is_some_and(|count| count > 1)
    }

    /// Number of nested variants collected so far.
    #[must_use]
    pub fn nested_count(&self) -> usize {
        self.nested_ads.as_ref().map_or(0, IndexMap::len)
    }
}

/// The result document of one scrape job.
///
/// Records are keyed by library identifier in page order, with
/// last-write-wins semantics: a later record with the same identifier
/// replaces the earlier one in place (see [`ScrapeResult::upsert`]).
/// `total_ads_processed` always equals the size of `ads_data`, including
/// after deserialization, where the stored count is recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredScrapeResult")]
pub struct ScrapeResult {
    /// Record containers discovered on the page, including ones that could
    /// not be extracted
    pub total_ads_found: u64,
    total_ads_processed: u64,
    ads_data: IndexMap<String, AdRecord>,
    /// Wall-clock duration of the whole scrape, in seconds
    pub scraping_time: f64,
    /// Public address of the process when the scrape started
    pub starting_ip: String,
    /// Public address of the process when the scrape ended
    pub ending_ip: String,
    /// Top-level extraction failure, if the routine aborted early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wire shape of [`ScrapeResult`]; `total_ads_processed` is derived, not read.
#[derive(Deserialize)]
struct StoredScrapeResult {
    total_ads_found: u64,
    #[serde(default)]
    ads_data: IndexMap<String, AdRecord>,
    scraping_time: f64,
    starting_ip: String,
    ending_ip: String,
    #[serde(default)]
    error: Option<String>,
}

impl From<StoredScrapeResult> for ScrapeResult {
    fn from(stored: StoredScrapeResult) -> Self {
        Self {
            total_ads_found: stored.total_ads_found,
            total_ads_processed: stored.ads_data.len() as u64,
            ads_data: stored.ads_data,
            scraping_time: stored.scraping_time,
            starting_ip: stored.starting_ip,
            ending_ip: stored.ending_ip,
            error: stored.error,
        }
    }
}

impl ScrapeResult {
    /// An empty result for a scrape that started from `starting_ip`.
    #[must_use]
    pub fn new(starting_ip: impl Into<String>) -> Self {
        Self {
            total_ads_found: 0,
            total_ads_processed: 0,
            ads_data: IndexMap::new(),
            scraping_time: 0.0,
            starting_ip: starting_ip.into(),
            ending_ip: String::new(),
            error: None,
        }
    }

    /// Build a result from extracted records, applying last-write-wins to
    /// duplicate identifiers.
    #[must_use]
    pub fn from_records(
        records: impl IntoIterator<Item = AdRecord>,
        total_ads_found: u64,
        elapsed: Duration,
        starting_ip: impl Into<String>,
        ending_ip: impl Into<String>,
    ) -> Self {
        let mut result = Self::new(starting_ip);
        for record in records {
            result.upsert(record);
        }
        result.total_ads_found = total_ads_found;
        result.finish(elapsed, ending_ip)
    }

    /// The zeroed payload returned when extraction aborts with `error`.
    #[must_use]
    pub fn failed(
        error: impl Into<String>,
        elapsed: Duration,
        starting_ip: impl Into<String>,
        ending_ip: impl Into<String>,
    ) -> Self {
        Self {
            total_ads_found: 0,
            total_ads_processed: 0,
            ads_data: IndexMap::new(),
            scraping_time: elapsed.as_secs_f64(),
            starting_ip: starting_ip.into(),
            ending_ip: ending_ip.into(),
            error: Some(error.into()),
        }
    }

    /// Insert a record, replacing any earlier record with the same
    /// identifier. Returns the replaced record.
    pub fn upsert(&mut self, record: AdRecord) -> Option<AdRecord> {
        let replaced = self.ads_data.insert(record.library_id.clone(), record);
        self.total_ads_processed = self.ads_data.len() as u64;
        replaced
    }

    /// Count `n` more discovered record containers.
    pub fn add_found(&mut self, n: usize) {
        self.total_ads_found += n as u64;
    }

    /// Stamp the elapsed time and the ending address.
    #[must_use]
    pub fn finish(mut self, elapsed: Duration, ending_ip: impl Into<String>) -> Self {
        self.scraping_time = elapsed.as_secs_f64();
        self.ending_ip = ending_ip.into();
        self
    }

    #[must_use]
    pub fn total_ads_processed(&self) -> u64 {
        self.total_ads_processed
    }

    #[must_use]
    pub fn ads_data(&self) -> &IndexMap<String, AdRecord> {
        &self.ads_data
    }

    #[must_use]
    pub fn get(&self, library_id: &str) -> Option<&AdRecord> {
        self.ads_data.get(library_id)
    }

    /// Serialize to the persisted JSON shape.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
