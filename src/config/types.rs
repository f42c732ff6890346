use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    pub output: OutputConfig,
}

/// Where the catalog lives and how its list pages are addressed
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    /// Origin used to resolve relative item links (e.g. "https://example.com")
    pub origin: String,

    /// List page URL template; `{page}` is replaced by the 1-based page index
    pub list_url: String,

    /// Number of list pages, when known up front
    #[serde(default)]
    pub total_pages: Option<u32>,

    /// Upper bound for open-ended discovery when `total_pages` is unset
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl CatalogConfig {
    /// Builds the URL of one list page
    pub fn list_page_url(&self, page: u32) -> String {
        self.list_url.replace("{page}", &page.to_string())
    }

    /// The last page index the discovery phase may visit
    pub fn last_page(&self) -> u32 {
        self.total_pages.unwrap_or(self.max_pages)
    }
}

/// Crawl pacing and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent workers
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Maximum attempts per unit of work (first try included)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff unit between attempts (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Minimum time between two requests of the same worker (milliseconds)
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Request identification
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            headers: BTreeMap::new(),
        }
    }
}

/// CSS selectors describing the list and detail page layouts
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectorConfig {
    /// Anchors inside the listing container
    #[serde(default = "default_list_links")]
    pub list_links: String,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_author")]
    pub author: String,

    #[serde(default = "default_genre")]
    pub genre: String,

    #[serde(default = "default_summary")]
    pub summary: String,

    #[serde(default = "default_view_count")]
    pub view_count: String,

    #[serde(default = "default_like_count")]
    pub like_count: String,

    /// Markers holding alternate names followed by the status (last one)
    #[serde(default = "default_status_markers")]
    pub status_markers: String,

    /// Trailing separator stripped from list titles
    #[serde(default = "default_title_suffix")]
    pub title_suffix: String,

    /// Separator used when joining multi-valued fields
    #[serde(default = "default_join_separator")]
    pub join_separator: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            list_links: default_list_links(),
            name: default_name(),
            author: default_author(),
            genre: default_genre(),
            summary: default_summary(),
            view_count: default_view_count(),
            like_count: default_like_count(),
            status_markers: default_status_markers(),
            title_suffix: default_title_suffix(),
            join_separator: default_join_separator(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding the checkpoint files
    pub state_dir: String,

    /// Path of the final tabular export
    pub export_path: String,

    #[serde(default)]
    pub export_format: ExportFormat,

    /// Worksheet name used by the xlsx export
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

/// Format of the final export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
    Json,
    /// Excel workbook with a single worksheet
    Xlsx,
}

fn default_sheet_name() -> String {
    "Items".to_string()
}

fn default_max_pages() -> u32 {
    10_000
}

fn default_concurrency() -> u32 {
    2
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_request_delay_ms() -> u64 {
    250
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36".to_string()
}

fn default_list_links() -> String {
    ".tiptip a".to_string()
}

fn default_name() -> String {
    "h1".to_string()
}

fn default_author() -> String {
    r#"a[href*="/tac-gia/"]"#.to_string()
}

fn default_genre() -> String {
    r#".description a[href*="/theloai/"]"#.to_string()
}

fn default_summary() -> String {
    ".detail .content".to_string()
}

fn default_view_count() -> String {
    "#PageViews".to_string()
}

fn default_like_count() -> String {
    "#LikeCount".to_string()
}

fn default_status_markers() -> String {
    ".description span.color-red".to_string()
}

fn default_title_suffix() -> String {
    ":".to_string()
}

fn default_join_separator() -> String {
    ", ".to_string()
}
