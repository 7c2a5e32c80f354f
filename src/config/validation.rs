use crate::config::types::{BatchConfig, ClientConfig, Config, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Highest accepted `max-retries`
const MAX_RETRIES_CEILING: u32 = 10;

/// Accepted `scrape-timeout-ms` range
const SCRAPE_TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 1_000..=300_000;

/// Accepted `concurrency` range
const CONCURRENCY_RANGE: std::ops::RangeInclusive<usize> = 1..=50;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_client_config(&config.client)?;
    validate_batch_config(&config.batch)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' cannot be used as a base",
            config.base_url
        )));
    }

    if config.max_retries > MAX_RETRIES_CEILING {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= {}, got {}",
            MAX_RETRIES_CEILING, config.max_retries
        )));
    }

    if !SCRAPE_TIMEOUT_RANGE_MS.contains(&config.scrape_timeout_ms) {
        return Err(ConfigError::Validation(format!(
            "scrape-timeout-ms must be between {} and {}, got {}",
            SCRAPE_TIMEOUT_RANGE_MS.start(),
            SCRAPE_TIMEOUT_RANGE_MS.end(),
            config.scrape_timeout_ms
        )));
    }

    if config.max_body_bytes < 1 {
        return Err(ConfigError::Validation(
            "max-body-bytes must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if !CONCURRENCY_RANGE.contains(&config.concurrency) {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between {} and {}, got {}",
            CONCURRENCY_RANGE.start(),
            CONCURRENCY_RANGE.end(),
            config.concurrency
        )));
    }
    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if config.name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "user-agent name must not contain whitespace, got '{}'",
            config.name
        )));
    }

    Ok(())
}
