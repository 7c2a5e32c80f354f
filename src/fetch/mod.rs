//! Fetch layer for logo requests
//!
//! This module contains everything that touches the network:
//! - The retrying fetch pipeline and its error classification
//! - Cancellation-aware delays
//! - Scrape-job polling for logos generated on demand
//! - Size-limited body reading

mod body;
mod pipeline;
mod retry;
mod scrape;

pub use body::{read_body_limited, DEFAULT_MAX_BODY_BYTES};
pub use pipeline::{
    build_http_client, fetch_with_retry, Auth, FetchOptions, Warning, WarningCallback,
};
pub use retry::{
    check_cancelled, rate_limit_delay, sleep_or_cancel, DEFAULT_MAX_RETRIES,
    MAX_RETRY_AFTER_SECS, SERVER_ERROR_RETRY_DELAY,
};
pub use scrape::{
    parse_scrape_envelope, poll_scrape_job, resolve_poll_url, resolve_scrape, ProgressCallback,
    ScrapeOptions, ScrapeProgress, DEFAULT_SCRAPE_TIMEOUT, MAX_POLL_INTERVAL,
};
