//! Per-field extraction for ad records.
//!
//! Every field has its own fallback chain (see [`crate::strategy`]) and a
//! field that cannot be read is left `None` without affecting the others.
//! Only a missing library identifier rejects the whole record.

use crate::error::{Result, ScrapeError};
use crate::strategy::{non_empty, FallbackChain, Read, Strategy};
use adscope_browser::{BrowserSession, ElementHandle};
use adscope_core::{AdRecord, IconKey, IconTables, Locator, MediaDescriptor, PageSelectors};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Input date formats, tried in order.
const DATE_FORMATS: [&str; 2] = ["%b %d, %Y", "%d %b %Y"];

/// Whether a record is a listing or a variant inside a summary overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    TopLevel,
    Nested,
}

impl Depth {
    /// Only listings open their summary overlay.
    pub fn can_expand(self) -> bool {
        matches!(self, Self::TopLevel)
    }
}

/// Start date and active time parsed from one "Started running on" line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningWindow {
    pub started_running: Option<String>,
    pub total_active_time: Option<String>,
}

/// Reads every [`AdRecord`] field from a record container.
pub struct FieldExtractor {
    icons: IconTables,
    platform_icons: Locator,
    category_icons: Locator,
    library_id: FallbackChain<String>,
    running_window: FallbackChain<String>,
    ads_count: FallbackChain<u32>,
    ad_text: FallbackChain<String>,
    destination_url: FallbackChain<String>,
    media: FallbackChain<MediaDescriptor>,
    cta_button_text: FallbackChain<String>,
}

impl FieldExtractor {
    pub fn new(selectors: &PageSelectors, icons: IconTables) -> Self {
        let prefix = selectors.library_id_prefix.clone();

        Self {
            icons,
            platform_icons: selectors.platform_icons.clone(),
            category_icons: selectors.category_icons.clone(),
            library_id: FallbackChain::new("library_id").then(Strategy::text(
                "library-id-label",
                selectors.library_id.clone(),
                move |text| strip_library_id(text, &prefix),
            )),
            running_window: FallbackChain::new("started_running").then(Strategy::text(
                "started-running-label",
                selectors.started_running.clone(),
                non_empty,
            )),
            ads_count: FallbackChain::new("ads_count").then(Strategy::text(
                "creative-count",
                selectors.variant_count.clone(),
                first_integer,
            )),
            ad_text: FallbackChain::new("ad_text").then(Strategy::text(
                "message-preview",
                selectors.ad_text.clone(),
                non_empty,
            )),
            destination_url: FallbackChain::new("destination_url").then(Strategy::attribute(
                "outbound-link",
                selectors.outbound_link.clone(),
                "href",
                decode_destination_url,
            )),
            media: FallbackChain::new("media")
                .then(Strategy::new(
                    "video",
                    selectors.video.clone(),
                    vec![Read::Attribute("src"), Read::Attribute("poster")],
                    |s| {
                        let src = non_empty(s.attribute("src")?)?;
                        let poster = s.attribute("poster").and_then(non_empty);
                        Some(MediaDescriptor::video(src, poster))
                    },
                ))
                .then(Strategy::attribute(
                    "preferred-image",
                    selectors.preferred_image.clone(),
                    "src",
                    |src| non_empty(src).map(MediaDescriptor::image),
                ))
                .then(Strategy::attribute(
                    "any-image",
                    selectors.any_image.clone(),
                    "src",
                    |src| non_empty(src).map(MediaDescriptor::image),
                )),
            cta_button_text: FallbackChain::new("cta_button_text")
                .then(Strategy::text(
                    "link-label",
                    selectors.cta_label.clone(),
                    non_empty,
                ))
                .then(Strategy::text(
                    "button-container-label",
                    selectors.cta_label_fallback.clone(),
                    non_empty,
                )),
        }
    }

    /// Extract one record.
    ///
    /// # Errors
    /// Returns `ScrapeError::MissingIdentifier` when the library identifier
    /// cannot be read; every other field degrades to `None`.
    pub async fn extract<S>(
        &self,
        session: &S,
        record: &ElementHandle,
        depth: Depth,
    ) -> Result<AdRecord>
    where
        S: BrowserSession + ?Sized,
    {
        let library_id = self
            .library_id
            .first_match(session, record)
            .await
            .ok_or(ScrapeError::MissingIdentifier)?;

        let mut ad = AdRecord::new(library_id);

        if let Some(text) = self.running_window.first_match(session, record).await {
            let window = parse_running_window(&text);
            if window.started_running.is_none() {
                tracing::debug!(
                    library_id = %ad.library_id,
                    ?depth,
                    "could not parse start date from {:?}",
                    text
                );
            }
            ad.started_running = window.started_running;
            ad.total_active_time = window.total_active_time;
        }

        ad.platforms = self
            .icon_keys(session, record, &self.platform_icons, &ad.library_id)
            .await
            .iter()
            .filter_map(|key| self.icons.platform(key.as_ref()))
            .collect();
        ad.categories = self
            .icon_keys(session, record, &self.category_icons, &ad.library_id)
            .await
            .iter()
            .map(|key| self.icons.category(key.as_ref()))
            .collect();

        ad.ads_count = self.ads_count.first_match(session, record).await;
        ad.ad_text = self.ad_text.first_match(session, record).await;
        ad.destination_url = self.destination_url.first_match(session, record).await;
        ad.media = self
            .media
            .first_match(session, record)
            .await
            .unwrap_or_default();
        ad.cta_button_text = self.cta_button_text.first_match(session, record).await;

        Ok(ad)
    }

    /// Icon identities of every styled icon matching `locator`.
    ///
    /// Icons without a style are skipped. A style that does not parse yields
    /// `None`, which categories still report as unknown.
    async fn icon_keys<S>(
        &self,
        session: &S,
        record: &ElementHandle,
        locator: &Locator,
        library_id: &str,
    ) -> Vec<Option<IconKey>>
    where
        S: BrowserSession + ?Sized,
    {
        let icons = match session.locate(Some(record), locator).await {
            Ok(icons) => icons,
            Err(e) => {
                tracing::debug!(library_id, %locator, "icon lookup failed: {}", e);
                return Vec::new();
            }
        };

        let mut keys = Vec::with_capacity(icons.len());
        for icon in &icons {
            let style = match session.attribute(icon, "style").await {
                Ok(Some(style)) if !style.trim().is_empty() => style,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(library_id, "icon style unreadable: {}", e);
                    continue;
                }
            };
            keys.push(parse_icon_style(&style));
        }
        keys
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

fn strip_library_id(text: &str, prefix: &str) -> Option<String> {
    let text = text.trim();
    non_empty(text.strip_prefix(prefix).unwrap_or(text))
}

/// Split a "Started running on ... · Total active time ..." line.
pub fn parse_running_window(text: &str) -> RunningWindow {
    static STARTED: OnceLock<Regex> = OnceLock::new();
    static ACTIVE: OnceLock<Regex> = OnceLock::new();

    let started_running = regex(&STARTED, r"Started running on (.*?)(?:·|$)")
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_listing_date(m.as_str()));

    let total_active_time = regex(&ACTIVE, r"Total active time\s+(.+?)(?:$|\s*·)")
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| non_empty(m.as_str()));

    RunningWindow {
        started_running,
        total_active_time,
    }
}

/// Normalize "Jan 5, 2024" or "5 Jan 2024" to `2024-01-05`.
pub fn parse_listing_date(text: &str) -> Option<String> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// Icon identity from an inline `style` attribute.
pub fn parse_icon_style(style: &str) -> Option<IconKey> {
    static IMAGE: OnceLock<Regex> = OnceLock::new();
    static POSITION: OnceLock<Regex> = OnceLock::new();

    let image = regex(&IMAGE, r#"mask-image:\s*url\(\s*["']?([^"')]+)["']?\s*\)"#)
        .captures(style)?
        .get(1)?
        .as_str()
        .trim()
        .to_string();
    let position = regex(&POSITION, r"mask-position:\s*([^;]+)")
        .captures(style)?
        .get(1)?
        .as_str()
        .trim()
        .to_string();

    Some(IconKey::new(image, position))
}

/// First run of ASCII digits in `text`.
pub fn first_integer(text: &str) -> Option<u32> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    regex(&DIGITS, r"\d+").find(text)?.as_str().parse().ok()
}

/// Landing page behind an outbound redirect link.
///
/// The href is percent-decoded; if it carries a `u` query parameter, that
/// parameter is decoded once more and returned, otherwise the decoded href.
pub fn decode_destination_url(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(href)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let target = url::Url::parse(&decoded).ok().and_then(|url| {
        url.query_pairs()
            .find(|(key, _)| key == "u")
            .map(|(_, value)| value.into_owned())
    });

    match target {
        Some(u) => Some(
            urlencoding::decode(&u)
                .map(|s| s.into_owned())
                .unwrap_or(u),
        ),
        None => Some(decoded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adscope_browser::mock::MockSession;
    use adscope_core::{IconConfig, MediaKind, UNKNOWN_CATEGORY};

    const FACEBOOK_STYLE: &str = r#"mask-image: url("https://static.xx.fbcdn.net/rsrc.php/v4/yV/r/OLar8kmsCmm.png"); mask-position: 0px -1188px; width: 12px;"#;

    const HOUSING_STYLE: &str = r#"mask-image: url("https://static.xx.fbcdn.net/rsrc.php/v4/y5/r/7Ia52m_bDk0.png"); mask-position: -32px -401px;"#;

    fn extractor(selectors: &PageSelectors) -> FieldExtractor {
        FieldExtractor::new(selectors, IconTables::from_config(&IconConfig::default()))
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_listing_date("Jan 5, 2024").as_deref(), Some("2024-01-05"));
        assert_eq!(parse_listing_date("5 Jan 2024").as_deref(), Some("2024-01-05"));
        assert_eq!(parse_listing_date(" Dec 31, 2023 ").as_deref(), Some("2023-12-31"));
        assert!(parse_listing_date("yesterday").is_none());
        assert!(parse_listing_date("").is_none());
    }

    #[test]
    fn test_running_window() {
        let window =
            parse_running_window("Started running on Jan 5, 2024 · Total active time 3 hrs");
        assert_eq!(window.started_running.as_deref(), Some("2024-01-05"));
        assert_eq!(window.total_active_time.as_deref(), Some("3 hrs"));

        let window = parse_running_window("Started running on 5 Jan 2024");
        assert_eq!(window.started_running.as_deref(), Some("2024-01-05"));
        assert!(window.total_active_time.is_none());

        let window = parse_running_window("Started running on sometime · Total active time 2 days");
        assert!(window.started_running.is_none());
        assert_eq!(window.total_active_time.as_deref(), Some("2 days"));
    }

    #[test]
    fn test_icon_style() {
        let key = parse_icon_style(FACEBOOK_STYLE).expect("parse style");
        assert_eq!(
            key.image,
            "https://static.xx.fbcdn.net/rsrc.php/v4/yV/r/OLar8kmsCmm.png"
        );
        assert_eq!(key.position, "0px -1188px");

        assert!(parse_icon_style("width: 12px;").is_none());
        assert!(parse_icon_style("mask-image: url(a.png);").is_none());
    }

    #[test]
    fn test_first_integer() {
        assert_eq!(first_integer("5 ads use this creative and text"), Some(5));
        assert_eq!(first_integer("This ad has 12 versions"), Some(12));
        assert_eq!(first_integer("no count"), None);
    }

    #[test]
    fn test_destination_url_unwraps_redirect() {
        let href = "https://l.facebook.com/l.php?u=https%3A%2F%2Fshop.example.com%2Fsale%3Fref%3Dfb&h=AT0";
        assert_eq!(
            decode_destination_url(href).as_deref(),
            Some("https://shop.example.com/sale?ref=fb")
        );
    }

    #[test]
    fn test_destination_url_double_encoded() {
        let href = "https://l.facebook.com/l.php?u=https%253A%252F%252Fshop.example.com%252Fa%2520b";
        assert_eq!(
            decode_destination_url(href).as_deref(),
            Some("https://shop.example.com/a b")
        );
    }

    #[test]
    fn test_destination_url_without_redirect() {
        assert_eq!(
            decode_destination_url("https://shop.example.com/a%20b").as_deref(),
            Some("https://shop.example.com/a b")
        );
        assert!(decode_destination_url("  ").is_none());
    }

    #[tokio::test]
    async fn test_extract_full_record() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let record = session.add_child(None, &selectors.records);

        let id = session.add_child(Some(&record), &selectors.library_id);
        session.set_text(&id, "Library ID: 1234567890");
        let started = session.add_child(Some(&record), &selectors.started_running);
        session.set_text(&started, "Started running on Jan 5, 2024 · Total active time 3 hrs");

        let platforms = session.add_children(Some(&record), &selectors.platform_icons, 2);
        session.set_attribute(&platforms[0], "style", FACEBOOK_STYLE);
        session.set_attribute(&platforms[1], "style", "mask-image: url(\"x.png\"); mask-position: 1px 1px;");
        let category = session.add_child(Some(&record), &selectors.category_icons);
        session.set_attribute(&category, "style", "mask-image: url(\"x.png\"); mask-position: 1px 1px;");

        let count = session.add_child(Some(&record), &selectors.variant_count);
        session.set_text(&count, "3 ads use this creative and text");
        let text = session.add_child(Some(&record), &selectors.ad_text);
        session.set_text(&text, "  Big sale today  ");
        let link = session.add_child(Some(&record), &selectors.outbound_link);
        session.set_attribute(
            &link,
            "href",
            "https://l.facebook.com/l.php?u=https%3A%2F%2Fshop.example.com%2F",
        );
        let image = session.add_child(Some(&record), &selectors.any_image);
        session.set_attribute(&image, "src", "https://img.example.com/ad.jpg");
        let cta = session.add_child(Some(&record), &selectors.cta_label_fallback);
        session.set_text(&cta, "Shop now");

        let ad = extractor(&selectors)
            .extract(&session, &record, Depth::TopLevel)
            .await
            .expect("extract record");

        assert_eq!(ad.library_id, "1234567890");
        assert_eq!(ad.started_running.as_deref(), Some("2024-01-05"));
        assert_eq!(ad.total_active_time.as_deref(), Some("3 hrs"));
        assert_eq!(ad.platforms, vec!["Facebook"]);
        assert_eq!(ad.categories, vec![UNKNOWN_CATEGORY]);
        assert_eq!(ad.ads_count, Some(3));
        assert_eq!(ad.ad_text.as_deref(), Some("Big sale today"));
        assert_eq!(ad.destination_url.as_deref(), Some("https://shop.example.com/"));
        assert_eq!(ad.media.kind, Some(MediaKind::Image));
        assert_eq!(ad.media.url.as_deref(), Some("https://img.example.com/ad.jpg"));
        assert!(ad.media.thumbnail.is_none());
        assert_eq!(ad.cta_button_text.as_deref(), Some("Shop now"));
        assert!(ad.nested_ads.is_none());
    }

    #[tokio::test]
    async fn test_video_preferred_over_image() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let record = session.add_child(None, &selectors.records);
        let id = session.add_child(Some(&record), &selectors.library_id);
        session.set_text(&id, "Library ID: 1");

        let video = session.add_child(Some(&record), &selectors.video);
        session.set_attribute(&video, "src", "https://v.example.com/a.mp4");
        session.set_attribute(&video, "poster", "https://i.example.com/poster.jpg");
        let image = session.add_child(Some(&record), &selectors.preferred_image);
        session.set_attribute(&image, "src", "https://img.example.com/ad.jpg");

        let ad = extractor(&selectors)
            .extract(&session, &record, Depth::TopLevel)
            .await
            .unwrap();
        assert_eq!(ad.media.kind, Some(MediaKind::Video));
        assert_eq!(ad.media.url.as_deref(), Some("https://v.example.com/a.mp4"));
        assert_eq!(
            ad.media.thumbnail.as_deref(),
            Some("https://i.example.com/poster.jpg")
        );
    }

    #[tokio::test]
    async fn test_missing_identifier_rejects_record() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let record = session.add_child(None, &selectors.records);
        let text = session.add_child(Some(&record), &selectors.ad_text);
        session.set_text(&text, "orphan");

        let err = extractor(&selectors)
            .extract(&session, &record, Depth::TopLevel)
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::MissingIdentifier));
    }

    #[tokio::test]
    async fn test_bare_record_has_null_fields() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let record = session.add_child(None, &selectors.records);
        let id = session.add_child(Some(&record), &selectors.library_id);
        session.set_text(&id, "Library ID: 77");
        session.fail_locator(&selectors.platform_icons);

        let ad = extractor(&selectors)
            .extract(&session, &record, Depth::Nested)
            .await
            .unwrap();
        assert_eq!(ad.library_id, "77");
        assert!(ad.platforms.is_empty());
        assert!(ad.categories.is_empty());
        assert!(ad.started_running.is_none());
        assert!(ad.media.is_empty());
        assert!(ad.cta_button_text.is_none());
    }

    #[tokio::test]
    async fn test_unstyled_category_icons_are_skipped() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let record = session.add_child(None, &selectors.records);
        let id = session.add_child(Some(&record), &selectors.library_id);
        session.set_text(&id, "Library ID: 55");

        let icons = session.add_children(Some(&record), &selectors.category_icons, 4);
        session.set_attribute(&icons[1], "style", "  ");
        session.set_attribute(&icons[2], "style", "width: 12px;");
        session.set_attribute(&icons[3], "style", HOUSING_STYLE);

        let ad = extractor(&selectors)
            .extract(&session, &record, Depth::TopLevel)
            .await
            .unwrap();
        assert_eq!(ad.categories, vec![UNKNOWN_CATEGORY, "Housing"]);
    }

    #[tokio::test]
    async fn test_primary_strategies_win_when_both_present() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let record = session.add_child(None, &selectors.records);
        let id = session.add_child(Some(&record), &selectors.library_id);
        session.set_text(&id, "Library ID: 9");

        let primary_cta = session.add_child(Some(&record), &selectors.cta_label);
        session.set_text(&primary_cta, "Learn more");
        let fallback_cta = session.add_child(Some(&record), &selectors.cta_label_fallback);
        session.set_text(&fallback_cta, "Shop now");

        let links = session.add_children(Some(&record), &selectors.outbound_link, 2);
        session.set_attribute(
            &links[0],
            "href",
            "https://l.facebook.com/l.php?u=https%3A%2F%2Fbrand.example.com%2Fspring",
        );
        session.set_attribute(&links[1], "href", "https://other.example.com/");

        let preferred = session.add_child(Some(&record), &selectors.preferred_image);
        session.set_attribute(&preferred, "src", "https://img.example.com/hero.jpg");
        let any = session.add_child(Some(&record), &selectors.any_image);
        session.set_attribute(&any, "src", "https://img.example.com/avatar.jpg");

        let ad = extractor(&selectors)
            .extract(&session, &record, Depth::TopLevel)
            .await
            .unwrap();
        assert_eq!(ad.cta_button_text.as_deref(), Some("Learn more"));
        assert_eq!(
            ad.destination_url.as_deref(),
            Some("https://brand.example.com/spring")
        );
        assert_eq!(ad.media.url.as_deref(), Some("https://img.example.com/hero.jpg"));
    }

    #[tokio::test]
    async fn test_empty_primary_cta_falls_through() {
        let selectors = PageSelectors::default();
        let session = MockSession::new();
        let record = session.add_child(None, &selectors.records);
        let id = session.add_child(Some(&record), &selectors.library_id);
        session.set_text(&id, "Library ID: 10");

        let primary_cta = session.add_child(Some(&record), &selectors.cta_label);
        session.set_text(&primary_cta, "   ");
        let fallback_cta = session.add_child(Some(&record), &selectors.cta_label_fallback);
        session.set_text(&fallback_cta, "Sign up");

        let ad = extractor(&selectors)
            .extract(&session, &record, Depth::TopLevel)
            .await
            .unwrap();
        assert_eq!(ad.cta_button_text.as_deref(), Some("Sign up"));
    }

    #[test]
    fn test_depth() {
        assert!(Depth::TopLevel.can_expand());
        assert!(!Depth::Nested.can_expand());
    }
}
