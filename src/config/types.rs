use crate::batch::{BatchOptions, DEFAULT_CONCURRENCY};
use crate::client::ClientSettings;
use crate::fetch::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_RETRIES, DEFAULT_SCRAPE_TIMEOUT};
use crate::metadata::Tier;
use crate::url::DEFAULT_BASE_URL;
use crate::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Main configuration structure
///
/// Every section is optional; missing keys take the library defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Request behavior shared by every fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ClientConfig {
    /// API base URL
    pub base_url: String,

    /// Rate-limit retries beyond the first attempt
    pub max_retries: u32,

    /// How long to wait for a scrape job (milliseconds)
    pub scrape_timeout_ms: u64,

    /// Largest accepted logo body
    pub max_body_bytes: u64,

    /// Plan used for warning thresholds when limit headers are missing
    pub tier: Tier,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            scrape_timeout_ms: DEFAULT_SCRAPE_TIMEOUT.as_millis() as u64,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            tier: Tier::default(),
        }
    }
}

/// Batch fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BatchConfig {
    /// Maximum domains fetched at once
    pub concurrency: usize,

    /// Keep going after a domain fails
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            continue_on_error: true,
        }
    }
}

/// User agent identification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserAgentConfig {
    pub name: String,
    pub version: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Config {
    /// Converts the file settings into client construction settings
    pub fn client_settings(&self) -> ConfigResult<ClientSettings> {
        let base_url = Url::parse(&self.client.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", self.client.base_url, e))
        })?;

        Ok(ClientSettings {
            base_url: Some(base_url),
            max_retries: self.client.max_retries,
            tier: self.client.tier,
            scrape_timeout: Duration::from_millis(self.client.scrape_timeout_ms),
            max_body_bytes: self.client.max_body_bytes,
            user_agent: self.user_agent.clone(),
        })
    }

    /// Batch options from the `[batch]` section
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.batch.concurrency,
            continue_on_error: self.batch.continue_on_error,
            ..BatchOptions::default()
        }
    }
}
