//! Icon lookup tables for platform and category badges.
//!
//! The ad library renders platforms and categories as sprite icons. An
//! icon's identity is the pair (mask image URL, mask position); labels are
//! resolved by exact lookup. Tables are built once from configuration and
//! passed to the field extractor; nothing here is process-global.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label used for categories whose icon is not in the table.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

const SPRITE_OLAR: &str = "https://static.xx.fbcdn.net/rsrc.php/v4/yV/r/OLar8kmsCmm.png";
const SPRITE_ZUVK: &str = "https://static.xx.fbcdn.net/rsrc.php/v4/yO/r/ZuVkzM77JQ-.png";
const SPRITE_7IA5: &str = "https://static.xx.fbcdn.net/rsrc.php/v4/y5/r/7Ia52m_bDk0.png";

/// Identity of a sprite icon.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IconKey {
    /// `mask-image` URL
    pub image: String,
    /// `mask-position` value, e.g. `0px -1188px`
    pub position: String,
}

impl IconKey {
    #[must_use]
    pub fn new(image: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            position: position.into(),
        }
    }
}

/// One configured icon → label entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconMapping {
    /// `mask-image` URL
    pub image: String,
    /// `mask-position` value
    pub position: String,
    /// Label the icon resolves to
    pub label: String,
}

impl IconMapping {
    fn new(image: &str, position: &str, label: &str) -> Self {
        Self {
            image: image.to_string(),
            position: position.to_string(),
            label: label.to_string(),
        }
    }
}

/// Icon configuration as stored in the TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconConfig {
    /// Platform icons (Facebook, Instagram, ...)
    pub platforms: Vec<IconMapping>,
    /// Special ad category icons (Employment, Housing, ...)
    pub categories: Vec<IconMapping>,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            platforms: vec![
                IconMapping::new(SPRITE_OLAR, "0px -1188px", "Facebook"),
                IconMapping::new(SPRITE_OLAR, "0px -1201px", "Instagram"),
                IconMapping::new(SPRITE_ZUVK, "-68px -189px", "Audience Network"),
                IconMapping::new(SPRITE_7IA5, "-246px -280px", "Messenger"),
                IconMapping::new(SPRITE_ZUVK, "-56px -206px", "Financial products and services"),
                IconMapping::new(SPRITE_OLAR, "0px -1214px", "Thread"),
            ],
            categories: vec![
                IconMapping::new(SPRITE_7IA5, "-189px -384px", "Employment"),
                IconMapping::new(SPRITE_7IA5, "-32px -401px", "Housing"),
                IconMapping::new(SPRITE_ZUVK, "-56px -206px", "Financial products and services"),
            ],
        }
    }
}

/// Exact-match icon lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconTable {
    entries: HashMap<IconKey, String>,
}

impl IconTable {
    /// Build a table; later mappings for the same key win.
    #[must_use]
    pub fn from_mappings(mappings: &[IconMapping]) -> Self {
        let entries = mappings
            .iter()
            .map(|m| (IconKey::new(&m.image, &m.position), m.label.clone()))
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn lookup(&self, key: &IconKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two tables the field extractor needs.
///
/// Unmapped icons are treated differently per table: an unknown platform is
/// dropped, an unknown category becomes [`UNKNOWN_CATEGORY`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconTables {
    platforms: IconTable,
    categories: IconTable,
}

impl IconTables {
    #[must_use]
    pub fn new(platforms: IconTable, categories: IconTable) -> Self {
        Self {
            platforms,
            categories,
        }
    }

    #[must_use]
    pub fn from_config(config: &IconConfig) -> Self {
        Self::new(
            IconTable::from_mappings(&config.platforms),
            IconTable::from_mappings(&config.categories),
        )
    }

    /// Platform label, or `None` for an unmapped or unreadable icon.
    #[must_use]
    pub fn platform(&self, key: Option<&IconKey>) -> Option<String> {
        key.and_then(|k| self.platforms.lookup(k))
            .map(ToString::to_string)
    }

    /// Category label; unmapped icons and unparseable styles resolve to
    /// "Unknown".
    #[must_use]
    pub fn category(&self, key: Option<&IconKey>) -> String {
        key.and_then(|k| self.categories.lookup(k))
            .unwrap_or(UNKNOWN_CATEGORY)
            .to_string()
    }
}
