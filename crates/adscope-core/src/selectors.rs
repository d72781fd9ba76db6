//! Page selectors for the ad library.
//!
//! The ad library ships obfuscated, frequently rotated class names, so every
//! locator the engine uses lives here as configuration. Relative XPath
//! expressions (starting with `.`) are resolved against a record container;
//! absolute ones against the document.

use crate::types::Locator;
use serde::{Deserialize, Serialize};

const GROUP_CLASS: &str = "xrvj5dj x18m771g x1p5oq8j xbxaen2 x18d9i69 x1u72gb5 xtqikln x1na6gtj x1jr1mh3 xm39877 x7sq92a xxy4fzi";
const CARD_CLASS: &str = "x6s0dn4 x78zum5 xdt5ytf xl56j7k x1n2onr6 x1ja2u2z x19gl646 xbumo9q";
const OUTBOUND_LINK: &str = r#".//a[contains(@class, "x1hl2dhg") and contains(@class, "x1lku1pv")]"#;
const OVERLAY_ROOT: &str =
    "/html/body/div[6]/div[1]/div[1]/div/div/div/div/div[2]/div[1]/div[2]/div[2]/div";

/// Every locator used while scraping one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSelectors {
    /// Element whose presence means the first batch of ads rendered
    pub initial_content: Locator,
    /// Coarse group containers
    pub groups: Locator,
    /// Secondary card containers, counted for diagnostics only
    pub cards: Locator,
    /// Record containers, relative to a group
    pub records: Locator,
    /// Any of these present means the list is exhausted
    pub end_markers: Vec<Locator>,

    /// "Library ID: ..." text node
    pub library_id: Locator,
    /// Prefix stripped from the library ID text
    pub library_id_prefix: String,
    /// "Started running on ... · Total active time ..." text node
    pub started_running: Locator,
    /// Platform icons
    pub platform_icons: Locator,
    /// Category icons
    pub category_icons: Locator,
    /// `<strong>` holding "N ads use this creative and text"
    pub variant_count: Locator,
    /// Ad body text
    pub ad_text: Locator,
    /// Outbound redirect link
    pub outbound_link: Locator,
    /// Video creative
    pub video: Locator,
    /// Image creative with the preferred class signature
    pub preferred_image: Locator,
    /// Any image inside the outbound link
    pub any_image: Locator,
    /// Call-to-action label inside the outbound link
    pub cta_label: Locator,
    /// Call-to-action label via the button container
    pub cta_label_fallback: Locator,

    /// "See summary details" control inside a record
    pub details_button: Locator,
    /// Scrollable region of the summary overlay
    pub overlay_scroll_region: Locator,
    /// Overlay heading span with the declared number of variants
    pub overlay_declared_count: Locator,
    /// Variant containers inside the overlay; the first one is a header
    pub overlay_items: Locator,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            initial_content: Locator::css(format!(r#"div[class="{GROUP_CLASS}"]"#)),
            groups: Locator::css(format!(r#"div[class="{GROUP_CLASS}"]"#)),
            cards: Locator::css(format!(r#"div[class="{CARD_CLASS}"]"#)),
            records: Locator::xpath(r#"./div[contains(@class, "xh8yej3")]"#),
            end_markers: vec![
                Locator::xpath("/html/body/div[1]/div/div/div/div/div/div/div[1]/div/div/div/div[5]/div[2]/div[9]/div[3]/div[2]/div"),
                Locator::xpath("/html/body/div[1]/div/div/div/div/div/div[1]/div/div/div/div[6]/div[2]/div[9]/div[3]/div[2]/div"),
            ],

            library_id: Locator::xpath(
                r#".//div[contains(@class, "x1rg5ohu x67bb7w")]/span[contains(text(), "Library ID:")]"#,
            ),
            library_id_prefix: "Library ID:".to_string(),
            started_running: Locator::xpath(r#".//span[contains(text(), "Started running on")]"#),
            platform_icons: Locator::xpath(
                r#".//span[contains(text(), "Platforms")]/following-sibling::div[1]//div[contains(@class, "xtwfq29")]"#,
            ),
            category_icons: Locator::xpath(
                r#".//span[contains(text(), "Categories")]/following-sibling::div[contains(@class, "x1rg5ohu") and contains(@class, "x67bb7w")]//div[contains(@class, "xtwfq29")]"#,
            ),
            variant_count: Locator::xpath(
                r#".//div[contains(@class, "x6s0dn4 x78zum5 xsag5q8")]//strong"#,
            ),
            ad_text: Locator::xpath(
                r#".//div[@data-ad-preview="message" or contains(@style, "white-space: pre-wrap")]"#,
            ),
            outbound_link: Locator::xpath(OUTBOUND_LINK),
            video: Locator::xpath(".//video"),
            preferred_image: Locator::xpath(format!(
                r#"{OUTBOUND_LINK}//img[contains(@class, "x168nmei") or contains(@class, "_8nqq")]"#
            )),
            any_image: Locator::xpath(format!("{OUTBOUND_LINK}//img")),
            cta_label: Locator::xpath(format!(
                r#"{OUTBOUND_LINK}//div[contains(@class, "x8t9es0") and contains(@class, "x1fvot60") and contains(@class, "xxio538")]"#
            )),
            cta_label_fallback: Locator::xpath(
                r#".//div[contains(@class, "x6s0dn4") and contains(@class, "x2izyaf")]//div[contains(@class, "x2lah0s")]//div[contains(@class, "x8t9es0") and contains(@class, "x1fvot60")]"#,
            ),

            details_button: Locator::xpath(
                r#".//div[contains(@class, "x193iq5w")]//div[@role="button"]//div[contains(text(), "See summary details")]"#,
            ),
            overlay_scroll_region: Locator::xpath(OVERLAY_ROOT),
            overlay_declared_count: Locator::xpath(format!(
                "{OVERLAY_ROOT}/div/div/div/div[2]/span[1]"
            )),
            overlay_items: Locator::xpath(format!(
                "{OVERLAY_ROOT}/div/div/div/div[3]/div/div[1]/div[1]/div"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_locators_are_relative() {
        let selectors = PageSelectors::default();
        for locator in [
            &selectors.records,
            &selectors.library_id,
            &selectors.started_running,
            &selectors.video,
            &selectors.cta_label,
            &selectors.details_button,
        ] {
            assert!(
                locator.expression().starts_with('.'),
                "expected relative locator, got {locator}"
            );
        }
    }

    #[test]
    fn test_overlay_locators_share_root() {
        let selectors = PageSelectors::default();
        let root = selectors.overlay_scroll_region.expression();
        assert!(selectors.overlay_items.expression().starts_with(root));
        assert!(selectors.overlay_declared_count.expression().starts_with(root));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let toml_str = r#"
library_id_prefix = "ID:"

[groups]
css = "div.group"
"#;
        let selectors: PageSelectors = toml::from_str(toml_str).expect("parse selectors");
        assert_eq!(selectors.library_id_prefix, "ID:");
        assert_eq!(selectors.groups, Locator::css("div.group"));
        assert_eq!(selectors.end_markers.len(), 2);
    }
}
