use crate::config::types::{
    AdapterConfig, CatalogConfig, Config, EngineConfig, OutputConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

const MAX_POOL_SIZE: usize = 256;
const MAX_RETRIES: u32 = 20;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine(&config.engine)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_catalog_config(&config.catalog)?;
    validate_adapter_config(&config.adapter, &config.catalog)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates engine configuration
///
/// The coordinator runs this before seeding, so embedders that build an
/// `EngineConfig` in code get the same guarantees as config files.
pub fn validate_engine(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.fetcher_concurrency < 1 || config.fetcher_concurrency > MAX_POOL_SIZE {
        return Err(ConfigError::Validation(format!(
            "fetcher_concurrency must be between 1 and {}, got {}",
            MAX_POOL_SIZE, config.fetcher_concurrency
        )));
    }

    if config.extractor_concurrency < 1 || config.extractor_concurrency > MAX_POOL_SIZE {
        return Err(ConfigError::Validation(format!(
            "extractor_concurrency must be between 1 and {}, got {}",
            MAX_POOL_SIZE, config.extractor_concurrency
        )));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "queue_capacity must be >= 1, got {}",
            config.queue_capacity
        )));
    }

    if config.handoff_capacity() < 1 {
        return Err(ConfigError::Validation(
            "handoff_capacity must be >= 1".to_string(),
        ));
    }

    if config.per_task_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "per_task_retries must be <= {}, got {}",
            MAX_RETRIES, config.per_task_retries
        )));
    }

    if config.per_task_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "per_task_timeout_ms must be >= 1".to_string(),
        ));
    }

    if config.max_backoff_ms < config.retry_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "max_backoff_ms ({}) must be >= retry_backoff_ms ({})",
            config.max_backoff_ms, config.retry_backoff_ms
        )));
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

/// Validates where the harvest starts
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    if config.root_tasks.is_empty() && config.listing_url.is_none() {
        return Err(ConfigError::Validation(
            "catalog needs at least one root task or a listing_url".to_string(),
        ));
    }

    for root in &config.root_tasks {
        validate_http_url(root, "root task")?;
    }

    if let Some(template) = &config.listing_url {
        if !template.contains("{page}") {
            return Err(ConfigError::Validation(format!(
                "listing_url '{}' must contain the {{page}} placeholder",
                template
            )));
        }
        if let Some(first) = config.listing_page(config.first_page) {
            validate_http_url(&first, "listing_url")?;
        }
    }

    if config.max_pages == 0 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the selector adapter rules
fn validate_adapter_config(
    config: &AdapterConfig,
    catalog: &CatalogConfig,
) -> Result<(), ConfigError> {
    if config.item_links.is_none() {
        return Err(ConfigError::Validation(
            "adapter.item_links is required to discover items on listing pages".to_string(),
        ));
    }

    if catalog.listing_url.is_some() && config.pagination.is_none() {
        return Err(ConfigError::Validation(
            "adapter.pagination is required when catalog.listing_url is set".to_string(),
        ));
    }

    if config.composite.is_some() != config.composite_links.is_some() {
        return Err(ConfigError::Validation(
            "adapter.composite and adapter.composite_links must be set together".to_string(),
        ));
    }

    if config.fields.is_empty() {
        return Err(ConfigError::Validation(
            "adapter needs at least one field".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for field in &config.fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(
                "field names cannot be empty".to_string(),
            ));
        }
        if !names.insert(field.name.as_str()) || config.constants.contains_key(&field.name) {
            return Err(ConfigError::Validation(format!(
                "duplicate field name '{}'",
                field.name
            )));
        }
        validate_selector(&field.selector)?;
    }

    if let Some(identity) = &config.identity_field {
        if !names.contains(identity.as_str()) {
            return Err(ConfigError::Validation(format!(
                "identity_field '{}' is not a configured field",
                identity
            )));
        }
    }

    for selector in [
        &config.item_links,
        &config.pagination,
        &config.composite,
        &config.composite_links,
    ]
    .into_iter()
    .flatten()
    {
        validate_selector(selector)?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if matches!(config.database_path.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if matches!(config.summary_path.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: e.to_string(),
        })
}

fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use HTTP or HTTPS",
            what, value
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
