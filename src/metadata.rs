//! Response metadata parsing
//!
//! Decodes the API's response headers into [`LogoMetadata`]. Missing or
//! malformed numeric headers become zero; nothing here fails.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;

/// Header names emitted by the logo API
pub mod header_names {
    pub const CACHE_STATUS: &str = "x-cache-status";
    pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
    pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
    pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
    pub const QUOTA_REMAINING: &str = "x-quota-remaining";
    pub const QUOTA_LIMIT: &str = "x-quota-limit";
    pub const TOKEN_PREFIX: &str = "x-quikturn-token";
    pub const RETRY_AFTER: &str = "retry-after";
    pub const TRANSFORMATION_APPLIED: &str = "x-transformation-applied";
    pub const TRANSFORMATION_METHOD: &str = "x-transformation-method";
    pub const TRANSFORMATION_WIDTH: &str = "x-transformation-width";
    pub const TRANSFORMATION_GREYSCALE: &str = "x-transformation-greyscale";
    pub const TRANSFORMATION_GAMMA: &str = "x-transformation-gamma";
    pub const ATTRIBUTION_REQUIRED: &str = "x-attribution-required";
    pub const ATTRIBUTION_STATUS: &str = "x-attribution-status";
    pub const ATTRIBUTION_GRACE_DEADLINE: &str = "x-attribution-grace-deadline";
}

/// Whether the logo was served from the edge cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
    Hit,
    #[default]
    Miss,
}

/// Server-side image transformation details
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transformation {
    pub applied: bool,
    pub method: Option<String>,
    pub width: Option<u32>,
    pub greyscale: bool,
    pub gamma: Option<f64>,
}

/// Attribution requirements for free-tier accounts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attribution {
    pub required: bool,
    pub status: Option<String>,
    pub grace_deadline: Option<DateTime<Utc>>,
}

/// Structured view of a logo response's headers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogoMetadata {
    pub cache_status: CacheStatus,
    pub rate_limit_remaining: u64,
    /// Unix epoch seconds at which the rate-limit window resets
    pub rate_limit_reset: u64,
    pub rate_limit_limit: u64,
    pub quota_remaining: u64,
    pub quota_limit: u64,
    pub transformation: Option<Transformation>,
    /// Echo of the token prefix the server authenticated
    pub token_prefix: Option<String>,
    pub attribution: Option<Attribution>,
}

impl LogoMetadata {
    /// Returns the rate-limit reset time, if the server sent one
    pub fn rate_limit_reset_at(&self) -> Option<DateTime<Utc>> {
        if self.rate_limit_reset == 0 {
            return None;
        }
        Utc.timestamp_opt(self.rate_limit_reset as i64, 0).single()
    }
}

/// Subscription tiers with their default ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Launch,
    Growth,
    Enterprise,
}

impl Tier {
    /// Requests permitted per minute
    pub fn rate_limit(&self) -> u64 {
        match self {
            Self::Free => 100,
            Self::Launch => 500,
            Self::Growth => 5_000,
            Self::Enterprise => 10_000,
        }
    }

    /// Requests permitted per month
    pub fn monthly_quota(&self) -> u64 {
        match self {
            Self::Free => 500_000,
            Self::Launch => 1_000_000,
            Self::Growth => 5_000_000,
            Self::Enterprise => 10_000_000,
        }
    }
}

/// Reads a header as a trimmed string
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reads a header as an unsigned integer, treating garbage as absent
pub(crate) fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|v| {
        v.parse::<u64>()
            .ok()
            .or_else(|| v.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
    })
}

fn header_bool(headers: &HeaderMap, name: &str) -> bool {
    header_str(headers, name).is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

/// Parses response headers into metadata
///
/// # Examples
///
/// ```
/// use reqwest::header::{HeaderMap, HeaderValue};
/// use quikturn_logos::metadata::{parse_metadata, CacheStatus};
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-cache-status", HeaderValue::from_static("HIT"));
/// headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
///
/// let metadata = parse_metadata(&headers);
/// assert_eq!(metadata.cache_status, CacheStatus::Hit);
/// assert_eq!(metadata.rate_limit_remaining, 42);
/// assert_eq!(metadata.quota_remaining, 0);
/// ```
pub fn parse_metadata(headers: &HeaderMap) -> LogoMetadata {
    let cache_status = match header_str(headers, header_names::CACHE_STATUS) {
        Some(v) if v.eq_ignore_ascii_case("hit") => CacheStatus::Hit,
        _ => CacheStatus::Miss,
    };

    LogoMetadata {
        cache_status,
        rate_limit_remaining: header_u64(headers, header_names::RATE_LIMIT_REMAINING).unwrap_or(0),
        rate_limit_reset: header_u64(headers, header_names::RATE_LIMIT_RESET).unwrap_or(0),
        rate_limit_limit: header_u64(headers, header_names::RATE_LIMIT_LIMIT).unwrap_or(0),
        quota_remaining: header_u64(headers, header_names::QUOTA_REMAINING).unwrap_or(0),
        quota_limit: header_u64(headers, header_names::QUOTA_LIMIT).unwrap_or(0),
        transformation: parse_transformation(headers),
        token_prefix: header_str(headers, header_names::TOKEN_PREFIX).map(str::to_string),
        attribution: parse_attribution(headers),
    }
}

fn parse_transformation(headers: &HeaderMap) -> Option<Transformation> {
    header_str(headers, header_names::TRANSFORMATION_APPLIED)?;

    Some(Transformation {
        applied: header_bool(headers, header_names::TRANSFORMATION_APPLIED),
        method: header_str(headers, header_names::TRANSFORMATION_METHOD).map(str::to_string),
        width: header_str(headers, header_names::TRANSFORMATION_WIDTH).and_then(|v| v.parse().ok()),
        greyscale: header_bool(headers, header_names::TRANSFORMATION_GREYSCALE),
        gamma: header_str(headers, header_names::TRANSFORMATION_GAMMA)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|g| g.is_finite()),
    })
}

fn parse_attribution(headers: &HeaderMap) -> Option<Attribution> {
    let required = header_str(headers, header_names::ATTRIBUTION_REQUIRED);
    let status = header_str(headers, header_names::ATTRIBUTION_STATUS);
    if required.is_none() && status.is_none() {
        return None;
    }

    Some(Attribution {
        required: header_bool(headers, header_names::ATTRIBUTION_REQUIRED),
        status: status.map(str::to_string),
        grace_deadline: header_str(headers, header_names::ATTRIBUTION_GRACE_DEADLINE)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|d| d.with_timezone(&Utc)),
    })
}
