//! Configuration module for Furrow
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use furrow::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("furrow.toml")).unwrap();
//! for source in &config.sources {
//!     println!("{} -> {}", source.name, source.listing_url);
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ListingOrder, OutputConfig, PaginationMode, SelectorConfig,
    SourceConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
