use crate::dates::DateLocale;
use crate::fetch::WaitUntil;
use chrono::NaiveDate;
use serde::Deserialize;

/// Main configuration structure for Furrow
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source by its configured name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Fetch and politeness configuration shared by all sources
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Per-request timeout (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Total fetch attempts per URL, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles on each further attempt (milliseconds)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff step (milliseconds)
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Random jitter added to each backoff step (milliseconds)
    #[serde(default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,

    /// Pause before retrying a fetch that hit a challenge page (milliseconds)
    #[serde(default = "default_blocked_pause_ms")]
    pub blocked_pause_ms: u64,

    /// Fixed delay after every successful fetch (milliseconds)
    #[serde(default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    /// Random extra delay on top of the politeness delay (milliseconds)
    #[serde(default = "default_politeness_jitter_ms")]
    pub politeness_jitter_ms: u64,

    /// Load condition handed to the fetcher
    #[serde(default)]
    pub wait_until: WaitUntil,

    /// Body fragments that identify an anti-bot challenge page
    #[serde(default = "default_challenge_markers")]
    pub challenge_markers: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            backoff_jitter_ms: default_backoff_jitter_ms(),
            blocked_pause_ms: default_blocked_pause_ms(),
            politeness_delay_ms: default_politeness_delay_ms(),
            politeness_jitter_ms: default_politeness_jitter_ms(),
            wait_until: WaitUntil::default(),
            challenge_markers: default_challenge_markers(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite ledger database
    pub ledger_path: String,

    /// Directory receiving `articles/` and `csv_fragments/`
    pub output_dir: String,

    /// Path to the markdown run summary
    pub summary_path: String,

    /// Path of the CSV produced by merging all fragments
    #[serde(default = "default_merged_path")]
    pub merged_path: String,
}

/// How the next listing page is located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationMode {
    /// Follow the explicit "next" control; stop when it is missing
    NextLink,
    /// Build page URLs from the page-path template
    PageNumber,
    /// Prefer the "next" control, fall back to the template
    #[default]
    Auto,
}

/// Whether a listing can be trusted to be newest-first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingOrder {
    /// First item older than the cutoff ends the run
    #[default]
    ReverseChronological,
    /// Older items are skipped and scanning continues
    Unordered,
}

/// One archive target
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Short identifier used in file names and the ledger
    pub name: String,

    /// First listing page
    pub listing_url: String,

    #[serde(default)]
    pub pagination: PaginationMode,

    /// Relative path of page N, `{n}` is replaced by the page number
    #[serde(default = "default_page_path_template")]
    pub page_path_template: String,

    pub max_pages: Option<u32>,
    pub max_candidates: Option<usize>,
    pub max_items: Option<usize>,

    /// Oldest acceptable publication date
    pub cutoff: Option<NaiveDate>,

    #[serde(default)]
    pub ordering: ListingOrder,

    #[serde(default)]
    pub date_locale: DateLocale,

    /// Minimum body length for pages carrying media markers
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,

    pub selectors: SelectorConfig,
}

/// CSS selectors describing a source's markup
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectorConfig {
    /// Container of one listing entry; when absent links are taken page-wide
    pub listing_item: Option<String>,

    #[serde(default = "default_listing_link")]
    pub listing_link: String,

    pub listing_date: Option<String>,
    pub listing_date_attribute: Option<String>,

    pub next_page: Option<String>,

    pub title: String,
    pub author: Option<String>,
    pub date: String,
    pub date_attribute: Option<String>,
    pub tags: Option<String>,
    pub categories: Option<String>,
    pub body: String,

    #[serde(default)]
    pub media_markers: Vec<String>,

    /// Body text from the first occurrence of any marker onwards is dropped
    #[serde(default)]
    pub boilerplate_markers: Vec<String>,
}

fn default_request_timeout_ms() -> u64 {
    90_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    2_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_backoff_jitter_ms() -> u64 {
    1_000
}

fn default_blocked_pause_ms() -> u64 {
    15_000
}

fn default_politeness_delay_ms() -> u64 {
    2_500
}

fn default_politeness_jitter_ms() -> u64 {
    2_000
}

fn default_challenge_markers() -> Vec<String> {
    crate::fetch::DEFAULT_CHALLENGE_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_merged_path() -> String {
    "archive_complete.csv".to_string()
}

fn default_page_path_template() -> String {
    "page/{n}/".to_string()
}

fn default_min_text_length() -> usize {
    300
}

fn default_listing_link() -> String {
    "a[href]".to_string()
}
