//! Scrape-job polling
//!
//! A logo the API has never seen comes back as `202 Accepted` with a job
//! envelope:
//!
//! ```json
//! {"status": "scrape_pending", "scrapeJob": {"jobId": "...", "pollUrl": "...", "estimatedWaitMs": 3000}}
//! ```
//!
//! The poller waits, polls the job endpoint with doubling backoff, and on
//! completion re-fetches the original logo URL.

use crate::fetch::pipeline::{authorized_get, fetch_with_retry, send_cancellable, Auth, FetchOptions};
use crate::fetch::retry::sleep_or_cancel;
use crate::state::{ScrapeJob, ScrapeStatus};
use crate::url::same_origin;
use crate::LogoError;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use url::Url;

/// Default wall-clock budget for one scrape job
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Ceiling on the backoff between polls
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(5_000);

/// First poll delay when the server gives no estimate
const DEFAULT_INITIAL_WAIT: Duration = Duration::from_millis(1_000);

/// Consecutive network failures tolerated per poll
const MAX_POLL_NETWORK_ATTEMPTS: u32 = 3;

/// Pause between network retries of a single poll
const POLL_NETWORK_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Envelope status announcing a scrape job
const SCRAPE_PENDING: &str = "scrape_pending";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingEnvelope {
    status: String,
    scrape_job: Option<ScrapeJob>,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: ScrapeStatus,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// Snapshot reported to the progress callback after every poll
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeProgress {
    pub job_id: String,
    pub status: ScrapeStatus,
    /// Server-reported completion, when provided
    pub progress: Option<f64>,
    pub elapsed: Duration,
    /// Number of polls so far, including this one
    pub polls: u32,
}

/// Receives a snapshot after every poll
pub type ProgressCallback = Arc<dyn Fn(&ScrapeProgress) + Send + Sync>;

/// Options for driving a scrape job
#[derive(Clone)]
pub struct ScrapeOptions {
    /// Wall-clock budget for the whole request
    pub timeout: Duration,

    /// When the first logo attempt started; polling start when unset
    pub started: Option<Instant>,

    /// Called after every poll, including the terminal one
    pub on_progress: Option<ProgressCallback>,

    /// Used for the final re-fetch; its cancellation token also governs polling
    pub fetch: FetchOptions,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SCRAPE_TIMEOUT,
            started: None,
            on_progress: None,
            fetch: FetchOptions::default(),
        }
    }
}

impl fmt::Debug for ScrapeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrapeOptions")
            .field("timeout", &self.timeout)
            .field("started", &self.started)
            .field("on_progress", &self.on_progress.is_some())
            .field("fetch", &self.fetch)
            .finish()
    }
}

/// Drives a pending response to completion
///
/// Responses other than `202 Accepted` are returned untouched. A 202 is
/// decoded as a scrape envelope and handed to [`poll_scrape_job`].
pub async fn resolve_scrape(
    client: &Client,
    response: Response,
    original_url: &Url,
    auth: &Auth,
    options: &ScrapeOptions,
) -> Result<Response, LogoError> {
    if response.status() != StatusCode::ACCEPTED {
        return Ok(response);
    }

    let body = response.text().await?;
    let job = parse_scrape_envelope(&body)?;
    debug!(
        "Logo for {} is being scraped (job {}, ~{}ms)",
        original_url.path(),
        job.job_id,
        job.estimated_wait_ms
    );

    poll_scrape_job(client, &job, original_url, auth, options).await
}

/// Decodes a `202 Accepted` body into its scrape job
pub fn parse_scrape_envelope(body: &str) -> Result<ScrapeJob, LogoError> {
    let envelope: PendingEnvelope =
        serde_json::from_str(body).map_err(|e| LogoError::ScrapeParse {
            message: format!("Invalid scrape envelope: {}", e),
        })?;

    if envelope.status != SCRAPE_PENDING {
        return Err(LogoError::ScrapeParse {
            message: format!("Unexpected envelope status '{}'", envelope.status),
        });
    }

    envelope.scrape_job.ok_or_else(|| LogoError::ScrapeParse {
        message: "Scrape envelope is missing scrapeJob".to_string(),
    })
}

/// Resolves a job's poll URL against the original request
///
/// The poll URL must share the original request's origin; anything else is
/// rejected before any network call.
pub fn resolve_poll_url(job: &ScrapeJob, original_url: &Url) -> Result<Url, LogoError> {
    let poll_url = original_url
        .join(&job.poll_url)
        .map_err(|e| LogoError::ScrapeParse {
            message: format!("Invalid poll URL '{}': {}", job.poll_url, e),
        })?;

    if !same_origin(&poll_url, original_url) {
        warn!(
            "Rejecting scrape job {}: poll URL origin {} differs from {}",
            job.job_id,
            poll_url.origin().ascii_serialization(),
            original_url.origin().ascii_serialization()
        );
        return Err(LogoError::ScrapeParse {
            message: format!(
                "Poll URL origin {} does not match request origin {}",
                poll_url.origin().ascii_serialization(),
                original_url.origin().ascii_serialization()
            ),
        });
    }

    Ok(poll_url)
}

fn initial_backoff(estimated_wait_ms: u64) -> Duration {
    if estimated_wait_ms == 0 {
        DEFAULT_INITIAL_WAIT
    } else {
        Duration::from_millis(estimated_wait_ms).min(MAX_POLL_INTERVAL)
    }
}

/// Polls a scrape job until it completes, fails, or times out
///
/// # Poll Loop
///
/// 1. Wait the current backoff (starting at the server's estimate)
/// 2. Poll the job endpoint, retrying up to 3 consecutive network failures
/// 3. `pending` → double the backoff (max 5s) and repeat
/// 4. `complete` → re-fetch the original logo URL and return it
/// 5. `failed` → `ScrapeFailed` with the server's message
///
/// The budget runs from `options.started` (polling start when unset) and
/// covers every delay, every poll request and the final re-fetch. Once it is
/// spent the loop fails with `ScrapeTimeout`. It fails with `Abort` as soon
/// as the cancellation token fires.
pub async fn poll_scrape_job(
    client: &Client,
    job: &ScrapeJob,
    original_url: &Url,
    auth: &Auth,
    options: &ScrapeOptions,
) -> Result<Response, LogoError> {
    let poll_url = resolve_poll_url(job, original_url)?;
    let cancel = options.fetch.cancel.as_ref();
    let start = options.started.unwrap_or_else(Instant::now);
    let mut backoff = initial_backoff(job.estimated_wait_ms);
    let mut current = ScrapeStatus::Pending;
    let mut polls = 0u32;

    loop {
        let remaining = time_left(job, start, options.timeout)?;
        sleep_or_cancel(backoff.min(remaining), cancel).await?;

        let poll = within_budget(job, start, options.timeout, async {
            poll_once(client, &poll_url, auth, options).await
        })
        .await?;
        polls += 1;
        trace!("Scrape job {} poll {}: {}", job.job_id, polls, poll.status);

        if !current.can_transition_to(poll.status) {
            return Err(LogoError::ScrapeParse {
                message: format!("Illegal job transition {} -> {}", current, poll.status),
            });
        }
        current = poll.status;

        if let Some(callback) = &options.on_progress {
            callback(&ScrapeProgress {
                job_id: job.job_id.clone(),
                status: poll.status,
                progress: poll.progress,
                elapsed: start.elapsed(),
                polls,
            });
        }

        if !poll.status.is_terminal() {
            backoff = (backoff * 2).min(MAX_POLL_INTERVAL);
            continue;
        }

        if poll.status == ScrapeStatus::Failed {
            let message = poll
                .error
                .unwrap_or_else(|| "Scrape job failed".to_string());
            warn!("Scrape job {} failed: {}", job.job_id, message);
            return Err(LogoError::ScrapeFailed { message });
        }

        debug!("Scrape job {} complete after {} polls", job.job_id, polls);
        return within_budget(job, start, options.timeout, async {
            refetch(client, original_url, auth, options).await
        })
        .await;
    }
}

fn timed_out(job: &ScrapeJob, start: Instant) -> LogoError {
    LogoError::ScrapeTimeout {
        job_id: job.job_id.clone(),
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}

/// Returns the remaining budget, or `ScrapeTimeout` once it is spent
fn time_left(job: &ScrapeJob, start: Instant, timeout: Duration) -> Result<Duration, LogoError> {
    let elapsed = start.elapsed();
    if elapsed >= timeout {
        return Err(timed_out(job, start));
    }
    Ok(timeout - elapsed)
}

/// Runs `work`, failing with `ScrapeTimeout` if the budget runs out first
async fn within_budget<T, F>(
    job: &ScrapeJob,
    start: Instant,
    budget: Duration,
    work: F,
) -> Result<T, LogoError>
where
    F: Future<Output = Result<T, LogoError>>,
{
    let remaining = time_left(job, start, budget)?;
    match tokio::time::timeout(remaining, work).await {
        Ok(result) => result,
        Err(_) => Err(timed_out(job, start)),
    }
}

/// Performs one poll
///
/// A non-2xx answer from the poll endpoint is reported as a `failed` job.
async fn poll_once(
    client: &Client,
    poll_url: &Url,
    auth: &Auth,
    options: &ScrapeOptions,
) -> Result<PollResponse, LogoError> {
    let cancel = options.fetch.cancel.as_ref();
    let mut failures = 0u32;

    let response = loop {
        match send_cancellable(authorized_get(client, poll_url, auth), cancel).await {
            Ok(response) => break response,
            Err(LogoError::Network { message }) => {
                failures += 1;
                if failures >= MAX_POLL_NETWORK_ATTEMPTS {
                    return Err(LogoError::Network { message });
                }
                debug!("Poll network failure {}: {}", failures, message);
                sleep_or_cancel(POLL_NETWORK_RETRY_DELAY, cancel).await?;
            }
            Err(other) => return Err(other),
        }
    };

    let status = response.status();
    if !status.is_success() {
        return Ok(PollResponse {
            status: ScrapeStatus::Failed,
            progress: None,
            error: Some(format!("Poll endpoint returned HTTP {}", status.as_u16())),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| LogoError::ScrapeParse {
        message: format!("Invalid poll response: {}", e),
    })
}

async fn refetch(
    client: &Client,
    original_url: &Url,
    auth: &Auth,
    options: &ScrapeOptions,
) -> Result<Response, LogoError> {
    let response = fetch_with_retry(client, original_url, auth, &options.fetch).await?;
    if response.status() == StatusCode::ACCEPTED {
        return Err(LogoError::ScrapeFailed {
            message: "Logo still pending after the scrape job completed".to_string(),
        });
    }
    Ok(response)
}
