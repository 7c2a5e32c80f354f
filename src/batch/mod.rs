//! Batch orchestration for bulk logo fetches
//!
//! This module fans a list of domains out across a fetch function with:
//! - Bounded concurrency
//! - Per-domain rate-limit retries that pause only that domain's slot
//! - Output ordered by input position, regardless of completion order
//! - Partial-failure capture or fail-fast, per [`BatchOptions`]
//! - Cooperative cancellation

mod orchestrator;

pub use orchestrator::{fetch_batch, BatchStream};

use crate::client::LogoResponse;
use crate::LogoError;
use tokio_util::sync::CancellationToken;

/// Default number of domains fetched at once
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Rate-limit retries per domain on top of the pipeline's own budget
pub const DEFAULT_BATCH_RATE_LIMIT_RETRIES: u32 = 3;

/// Options for a batch fetch
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum domains in flight; values below 1 are treated as 1
    pub concurrency: usize,

    /// Record per-domain failures instead of aborting the batch
    pub continue_on_error: bool,

    /// Stops new domains from starting once fired
    pub cancel: Option<CancellationToken>,

    /// Extra attempts per domain after a rate-limit error
    pub max_rate_limit_retries: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            continue_on_error: true,
            cancel: None,
            max_rate_limit_retries: DEFAULT_BATCH_RATE_LIMIT_RETRIES,
        }
    }
}

/// Outcome for one requested domain
#[derive(Debug, Clone)]
pub struct BatchResult<T = LogoResponse> {
    /// The domain exactly as it was requested
    pub domain: String,

    /// The fetched logo, or the error that stopped it
    pub outcome: Result<T, LogoError>,
}

impl<T> BatchResult<T> {
    /// Returns true if the domain was fetched
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns the error, if the domain failed
    pub fn error(&self) -> Option<&LogoError> {
        self.outcome.as_ref().err()
    }
}
