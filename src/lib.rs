//! Quikturn Logos: a resilient client for the Quikturn logo API
//!
//! This crate turns a domain name into a company logo image. It covers
//! domain validation and URL construction, the HTTP error taxonomy, retry and
//! backoff for rate limits and transient server errors, polling of
//! on-demand scrape jobs, and a concurrency-bounded batch orchestrator.

pub mod batch;
pub mod client;
pub mod config;
pub mod fetch;
pub mod metadata;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for logo operations
///
/// Every failure is classified into exactly one variant at the point of
/// detection and travels unchanged through the pipeline, poller, batch and
/// client layers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LogoError {
    #[error("Invalid domain '{domain}': {reason}")]
    DomainValidation { domain: String, reason: String },

    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
    },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("No logo found for {domain}")]
    NotFound { domain: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Rate limited, retry after {retry_after}s (remaining {remaining}, reset {reset})")]
    RateLimit {
        retry_after: u64,
        remaining: u64,
        reset: u64,
    },

    #[error("Monthly quota exceeded ({used}/{limit}), retry after {retry_after}s")]
    QuotaExceeded {
        retry_after: u64,
        limit: u64,
        used: u64,
    },

    #[error("Scrape job {job_id} timed out after {elapsed_ms}ms")]
    ScrapeTimeout { job_id: String, elapsed_ms: u64 },

    #[error("Scrape job failed: {message}")]
    ScrapeFailed { message: String },

    #[error("Malformed scrape response: {message}")]
    ScrapeParse { message: String },

    #[error("Request aborted")]
    Abort,

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response (HTTP {status}): {message}")]
    Unexpected { status: u16, message: String },
}

/// Machine-readable error codes, one per [`LogoError`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DomainValidation,
    Authentication,
    Forbidden,
    NotFound,
    BadRequest,
    RateLimit,
    QuotaExceeded,
    ScrapeTimeout,
    ScrapeFailed,
    ScrapeParse,
    Abort,
    Network,
    Server,
    Unexpected,
}

impl ErrorCode {
    /// Returns the stable wire string for this code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainValidation => "DOMAIN_VALIDATION_ERROR",
            Self::Authentication => "AUTHENTICATION_ERROR",
            Self::Forbidden => "FORBIDDEN_ERROR",
            Self::NotFound => "NOT_FOUND_ERROR",
            Self::BadRequest => "BAD_REQUEST_ERROR",
            Self::RateLimit => "RATE_LIMIT_ERROR",
            Self::QuotaExceeded => "QUOTA_EXCEEDED_ERROR",
            Self::ScrapeTimeout => "SCRAPE_TIMEOUT_ERROR",
            Self::ScrapeFailed => "SCRAPE_FAILED_ERROR",
            Self::ScrapeParse => "SCRAPE_PARSE_ERROR",
            Self::Abort => "ABORT_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Server => "SERVER_ERROR",
            Self::Unexpected => "UNEXPECTED_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LogoError {
    /// Returns the machine-readable code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DomainValidation { .. } => ErrorCode::DomainValidation,
            Self::Authentication { .. } => ErrorCode::Authentication,
            Self::Forbidden { .. } => ErrorCode::Forbidden,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::BadRequest { .. } => ErrorCode::BadRequest,
            Self::RateLimit { .. } => ErrorCode::RateLimit,
            Self::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            Self::ScrapeTimeout { .. } => ErrorCode::ScrapeTimeout,
            Self::ScrapeFailed { .. } => ErrorCode::ScrapeFailed,
            Self::ScrapeParse { .. } => ErrorCode::ScrapeParse,
            Self::Abort => ErrorCode::Abort,
            Self::Network { .. } => ErrorCode::Network,
            Self::Server { .. } => ErrorCode::Server,
            Self::Unexpected { .. } => ErrorCode::Unexpected,
        }
    }

    /// Returns the HTTP status code that produced this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::BadRequest { .. } => Some(400),
            Self::RateLimit { .. } | Self::QuotaExceeded { .. } => Some(429),
            Self::Server { status, .. } | Self::Unexpected { status, .. } => Some(*status),
            Self::DomainValidation { .. }
            | Self::ScrapeTimeout { .. }
            | Self::ScrapeFailed { .. }
            | Self::ScrapeParse { .. }
            | Self::Abort
            | Self::Network { .. } => None,
        }
    }

    /// Builds a domain validation error
    pub(crate) fn invalid_domain(domain: &str, reason: impl Into<String>) -> Self {
        Self::DomainValidation {
            domain: domain.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for LogoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network {
                message: "Request timeout".to_string(),
            }
        } else if err.is_connect() {
            Self::Network {
                message: format!("Connection failed: {}", err),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
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
}

/// Result type alias for logo operations
pub type Result<T> = std::result::Result<T, LogoError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use batch::{fetch_batch, BatchOptions, BatchResult, BatchStream};
pub use client::{BrowserClient, BrowserLogo, LogoResponse, ServerClient};
pub use config::Config;
pub use metadata::{parse_metadata, LogoMetadata, Tier};
pub use crate::url::{build_logo_url, validate_domain, LogoRequest, TokenClass};
