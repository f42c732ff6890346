//! Item references discovered on list pages and the records extracted from
//! their detail pages.

use serde::{Deserialize, Serialize};

/// A link to one catalog item, as found on a list page
///
/// Identity is the absolute `url`; titles may repeat across items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReference {
    pub title: String,
    pub url: String,
}

impl ItemReference {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Placeholder stored in `alternate_names` when the page lists only a status
pub const NO_ALTERNATE_NAME: &str = "no alternate name";

/// Structured fields extracted from one detail page
///
/// Every field is free text. A field the page did not provide is an empty
/// string, so exports always carry the same column set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRecord {
    /// Key; matches the `url` of the originating `ItemReference`
    pub url: String,
    pub name: String,
    pub author: String,
    pub genre: String,
    pub summary: String,
    pub view_count: String,
    pub like_count: String,
    pub status: String,
    pub alternate_names: String,
}

impl ItemRecord {
    /// Column names in export order
    pub const COLUMNS: [&'static str; 9] = [
        "url",
        "name",
        "author",
        "genre",
        "summary",
        "view_count",
        "like_count",
        "status",
        "alternate_names",
    ];

    /// An empty record keyed by `url`
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Field values in the same order as [`ItemRecord::COLUMNS`]
    pub fn row(&self) -> [&str; 9] {
        [
            self.url.as_str(),
            self.name.as_str(),
            self.author.as_str(),
            self.genre.as_str(),
            self.summary.as_str(),
            self.view_count.as_str(),
            self.like_count.as_str(),
            self.status.as_str(),
            self.alternate_names.as_str(),
        ]
    }
}
