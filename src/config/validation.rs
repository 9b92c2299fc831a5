use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, SelectorConfig, SourceConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates fetch and politeness settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= 100ms, got {}ms",
            config.request_timeout_ms
        )));
    }

    if config.max_attempts < 1 || config.max_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 20, got {}",
            config.max_attempts
        )));
    }

    if config.backoff_max_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_max_ms ({}) must not be below backoff_base_ms ({})",
            config.backoff_max_ms, config.backoff_base_ms
        )));
    }

    if config.challenge_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "challenge_markers cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("ledger_path", &config.ledger_path),
        ("output_dir", &config.output_dir),
        ("summary_path", &config.summary_path),
        ("merged_path", &config.merged_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates every source and checks that names are unique
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for source in sources {
        validate_source(source)?;

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source name '{}'",
                source.name
            )));
        }
    }

    Ok(())
}

fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    if source.name.is_empty()
        || !source
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "Source name must be non-empty and use only [A-Za-z0-9_-], got '{}'",
            source.name
        )));
    }

    let url = Url::parse(&source.listing_url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid listing_url '{}' for source '{}': {}",
            source.listing_url, source.name, e
        ))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "listing_url '{}' must use http or https",
            source.listing_url
        )));
    }

    if !source.page_path_template.contains("{n}") {
        return Err(ConfigError::Validation(format!(
            "page_path_template for source '{}' must contain {{n}}, got '{}'",
            source.name, source.page_path_template
        )));
    }

    if source.max_pages == Some(0) {
        return Err(ConfigError::Validation(format!(
            "max_pages for source '{}' must be >= 1",
            source.name
        )));
    }

    validate_selectors(&source.name, &source.selectors)
}

/// Compiles every configured selector so that typos fail at startup
fn validate_selectors(source: &str, selectors: &SelectorConfig) -> Result<(), ConfigError> {
    let required = [
        &selectors.listing_link,
        &selectors.title,
        &selectors.date,
        &selectors.body,
    ];
    let optional = [
        &selectors.listing_item,
        &selectors.listing_date,
        &selectors.next_page,
        &selectors.author,
        &selectors.tags,
        &selectors.categories,
    ];

    let all = required
        .into_iter()
        .chain(optional.into_iter().flatten())
        .chain(selectors.media_markers.iter());

    for css in all {
        Selector::parse(css).map_err(|e| {
            ConfigError::InvalidSelector(format!(
                "source '{}': '{}' does not parse: {:?}",
                source, css, e
            ))
        })?;
    }

    if selectors.listing_date_attribute.is_some() && selectors.listing_date.is_none() {
        return Err(ConfigError::Validation(format!(
            "source '{}': listing_date_attribute requires listing_date",
            source
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
