//! Furrow: an incremental archive crawler for news and market-report listings
//!
//! This crate walks paginated article listings, fetches each new article
//! politely, extracts its fields through per-source selector rules and keeps a
//! durable ledger so that re-runs only pick up what is new.

pub mod config;
pub mod crawler;
pub mod dates;
pub mod extract;
pub mod fetch;
pub mod ledger;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Furrow operations
///
/// Per-candidate problems (fetch failures, unparseable dates, thin pages) are
/// not errors: they become [`state::SkipReason`]s. Only conditions that need an
/// operator end up here.
#[derive(Debug, Error)]
pub enum FurrowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Listing for source '{source_name}' yielded no candidates at {url}; the markup may have changed")]
    ListingUnrecognized { source_name: String, url: String },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Furrow operations
pub type Result<T> = std::result::Result<T, FurrowError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{ArchiveCrawler, ArticleRecord, CandidateDiscoverer, CrawlResult};
pub use dates::{DateLocale, DateNormalizer};
pub use state::{CrawlCursor, SkipReason, StopReason};
pub use crate::url::normalize_url;
