use crate::config::types::{CatalogConfig, Config, CrawlerConfig, OutputConfig, SelectorConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_catalog_config(&config.catalog)?;
    validate_crawler_config(&config.crawler)?;
    validate_selector_config(&config.selectors)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates catalog addressing
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    validate_http_url("origin", &config.origin)?;

    if !config.list_url.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "list-url must contain a {{page}} placeholder, got '{}'",
            config.list_url
        )));
    }
    validate_http_url("list-url", &config.list_page_url(1))?;

    if config.total_pages == Some(0) {
        return Err(ConfigError::Validation(
            "total-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates crawler tuning
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Selectors are compiled by the extractor; here we only reject blanks
fn validate_selector_config(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("list-links", &config.list_links),
        ("name", &config.name),
        ("author", &config.author),
        ("genre", &config.genre),
        ("summary", &config.summary),
        ("view-count", &config.view_count),
        ("like-count", &config.like_count),
        ("status-markers", &config.status_markers),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "selector '{}' cannot be empty",
                field
            )));
        }
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.state_dir.is_empty() {
        return Err(ConfigError::Validation(
            "state-dir cannot be empty".to_string(),
        ));
    }

    if config.export_path.is_empty() {
        return Err(ConfigError::Validation(
            "export-path cannot be empty".to_string(),
        ));
    }

    validate_sheet_name(&config.sheet_name)
}

/// Excel limits worksheet names to 31 characters and forbids a few symbols
fn validate_sheet_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sheet-name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > 31 {
        return Err(ConfigError::Validation(format!(
            "sheet-name '{}' is longer than 31 characters",
            name
        )));
    }

    if name.contains(['[', ']', ':', '*', '?', '/', '\\'])
        || name.starts_with('\'')
        || name.ends_with('\'')
    {
        return Err(ConfigError::Validation(format!(
            "sheet-name '{}' contains a character Excel does not allow",
            name
        )));
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
