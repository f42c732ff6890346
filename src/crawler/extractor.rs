//! HTML extraction for list and detail pages
//!
//! Both operations are pure and total: a page missing an expected element
//! yields empty strings for the affected fields, never an error.

use crate::config::SelectorConfig;
use crate::state::{ItemRecord, ItemReference, NO_ALTERNATE_NAME};
use crate::HarvestError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Compiled selectors plus the origin used to resolve relative links
#[derive(Debug, Clone)]
pub struct Extractor {
    origin: Url,
    list_links: Selector,
    name: Selector,
    author: Selector,
    genre: Selector,
    summary: Selector,
    view_count: Selector,
    like_count: Selector,
    status_markers: Selector,
    title_suffix: String,
    join_separator: String,
}

impl Extractor {
    /// Compiles the configured selectors
    ///
    /// # Returns
    ///
    /// * `Ok(Extractor)` - All selectors compiled
    /// * `Err(HarvestError::Selector)` - A selector is not valid CSS
    pub fn new(origin: &str, selectors: &SelectorConfig) -> Result<Self, HarvestError> {
        let origin = Url::parse(origin).map_err(|e| {
            HarvestError::Config(crate::ConfigError::InvalidUrl(format!(
                "Invalid origin '{}': {}",
                origin, e
            )))
        })?;

        Ok(Self {
            origin,
            list_links: compile("list-links", &selectors.list_links)?,
            name: compile("name", &selectors.name)?,
            author: compile("author", &selectors.author)?,
            genre: compile("genre", &selectors.genre)?,
            summary: compile("summary", &selectors.summary)?,
            view_count: compile("view-count", &selectors.view_count)?,
            like_count: compile("like-count", &selectors.like_count)?,
            status_markers: compile("status-markers", &selectors.status_markers)?,
            title_suffix: selectors.title_suffix.clone(),
            join_separator: selectors.join_separator.clone(),
        })
    }

    /// Extracts the item references of one list page
    ///
    /// Anchors without a usable `href` are skipped. Titles are trimmed and
    /// lose one trailing separator; links are resolved against the origin.
    /// A url repeated within the page is kept once, with its first title.
    pub fn extract_list_page(&self, body: &str) -> Vec<ItemReference> {
        let document = Html::parse_document(body);
        let mut seen = HashSet::new();
        let mut references = Vec::new();

        for anchor in document.select(&self.list_links) {
            let Some(url) = anchor
                .value()
                .attr("href")
                .and_then(|href| self.resolve_link(href))
            else {
                continue;
            };

            if !seen.insert(url.clone()) {
                continue;
            }

            let title = self.clean_title(&element_text(&anchor));
            references.push(ItemReference { title, url });
        }

        references
    }

    /// Extracts the detail fields of one item
    pub fn extract_detail_page(&self, item: &ItemReference, body: &str) -> ItemRecord {
        let document = Html::parse_document(body);

        let markers: Vec<String> = document
            .select(&self.status_markers)
            .map(|el| element_text(&el))
            .collect();
        let (status, alternate_names) = split_status_markers(&markers, &self.join_separator);

        ItemRecord {
            url: item.url.clone(),
            name: self.all_text(&document, &self.name),
            author: self.joined(&document, &self.author),
            genre: self.joined(&document, &self.genre),
            summary: self.all_text(&document, &self.summary),
            view_count: self.all_text(&document, &self.view_count),
            like_count: self.all_text(&document, &self.like_count),
            status,
            alternate_names,
        }
    }

    /// Concatenated text of every match, trimmed
    fn all_text(&self, document: &Html, selector: &Selector) -> String {
        document
            .select(selector)
            .map(|el| el.text().collect::<String>())
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Text of each match, empty entries dropped, joined by the separator
    fn joined(&self, document: &Html, selector: &Selector) -> String {
        document
            .select(selector)
            .map(|el| element_text(&el))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(&self.join_separator)
    }

    fn clean_title(&self, text: &str) -> String {
        let text = text.trim();
        let text = if self.title_suffix.is_empty() {
            text
        } else {
            text.strip_suffix(self.title_suffix.as_str()).unwrap_or(text)
        };
        text.trim_end().to_string()
    }

    /// Resolves an href against the origin
    ///
    /// Returns None for empty, fragment-only, `javascript:` and `mailto:`
    /// links, and for anything that does not end up as http(s).
    fn resolve_link(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            return None;
        }

        let url = self.origin.join(href).ok()?;
        matches!(url.scheme(), "http" | "https").then(|| url.to_string())
    }
}

/// Splits status markers: the last one is the status, any before it are
/// alternate names
///
/// - no markers: empty status, empty alternate names
/// - one marker: that status, and the "no alternate name" placeholder
/// - several: last is the status, the rest joined as alternate names
pub fn split_status_markers(markers: &[String], separator: &str) -> (String, String) {
    match markers.split_last() {
        None => (String::new(), String::new()),
        Some((status, [])) => (status.clone(), NO_ALTERNATE_NAME.to_string()),
        Some((status, alternates)) => (status.clone(), alternates.join(separator)),
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn compile(field: &str, css: &str) -> Result<Selector, HarvestError> {
    Selector::parse(css).map_err(|e| HarvestError::Selector {
        field: field.to_string(),
        message: format!("'{}': {:?}", css, e),
    })
}
