//! Logo fetch pipeline
//!
//! This module performs one logical logo request:
//! - Building the HTTP client with the configured user agent
//! - Transmitting the token (query parameter or bearer header)
//! - Retrying rate-limited and transient server failures
//! - Classifying every other failure into a [`LogoError`]
//! - Emitting low rate-limit and quota warnings on success

use crate::config::UserAgentConfig;
use crate::fetch::retry::{
    check_cancelled, rate_limit_delay, sleep_or_cancel, DEFAULT_MAX_RETRIES,
    SERVER_ERROR_RETRY_DELAY,
};
use crate::metadata::{header_names, header_u64, Tier};
use crate::url::{domain_from_path, token_prefix};
use crate::LogoError;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Longest error body carried into an error message
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Most of an error body ever buffered
const MAX_ERROR_BODY_BYTES: usize = 1024;

/// How the credential travels with each request
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// No credential
    None,
    /// `?token=...` on the request URL
    Query(String),
    /// `Authorization: Bearer ...`
    Bearer(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "Auth::None"),
            Self::Query(token) => write!(f, "Auth::Query({}…)", token_prefix(token)),
            Self::Bearer(token) => write!(f, "Auth::Bearer({}…)", token_prefix(token)),
        }
    }
}

/// A proactive notice that a limit is close to exhaustion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// Fewer than 10% of the per-window requests remain
    RateLimit { remaining: u64, limit: u64 },
    /// Fewer than 10% of the monthly quota remains
    Quota { remaining: u64, limit: u64 },
}

/// Receives warnings emitted by successful responses
pub type WarningCallback = Arc<dyn Fn(&Warning) + Send + Sync>;

/// Options for a single pipeline invocation
#[derive(Clone)]
pub struct FetchOptions {
    /// Attempts allowed beyond the first for rate-limited responses
    pub max_retries: u32,

    /// Tier used when the server omits limit headers
    pub tier: Tier,

    /// Cooperative cancellation
    pub cancel: Option<CancellationToken>,

    /// Receives rate-limit and quota warnings
    pub on_warning: Option<WarningCallback>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            tier: Tier::default(),
            cancel: None,
            on_warning: None,
        }
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("max_retries", &self.max_retries)
            .field("tier", &self.tier)
            .field("cancel", &self.cancel)
            .field("on_warning", &self.on_warning.is_some())
            .finish()
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Example
///
/// ```no_run
/// use quikturn_logos::config::UserAgentConfig;
/// use quikturn_logos::fetch::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", config.name, config.version);

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Creates a GET request carrying the credential
///
/// For `Auth::Query` the token is appended when the URL does not already
/// carry one, so callers can hand in either a built logo URL or a bare one.
pub(crate) fn authorized_get(client: &Client, url: &Url, auth: &Auth) -> RequestBuilder {
    match auth {
        Auth::None => client.get(url.clone()),
        Auth::Query(token) => {
            let mut url = url.clone();
            if !url.query_pairs().any(|(k, _)| k == "token") {
                url.query_pairs_mut().append_pair("token", token);
            }
            client.get(url)
        }
        Auth::Bearer(token) => client.get(url.clone()).bearer_auth(token),
    }
}

/// Sends a request, resolving early with `Abort` if the token fires
pub(crate) async fn send_cancellable(
    request: RequestBuilder,
    cancel: Option<&CancellationToken>,
) -> Result<Response, LogoError> {
    check_cancelled(cancel)?;

    let result = match cancel {
        Some(token) => {
            tokio::select! {
                _ = token.cancelled() => return Err(LogoError::Abort),
                result = request.send() => result,
            }
        }
        None => request.send().await,
    };

    result.map_err(LogoError::from)
}

/// Fetches a logo URL with retry and backoff
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Success; emit warnings below 10% of limits |
/// | HTTP 401 | Immediate → Authentication |
/// | HTTP 403 | Immediate → Forbidden (body as reason) |
/// | HTTP 404 | Immediate → NotFound (domain from path) |
/// | HTTP 400 | Immediate → BadRequest (body as message) |
/// | HTTP 429 + `X-Quota-Limit` | Immediate → QuotaExceeded |
/// | HTTP 429 | Wait `Retry-After` (1s..300s), up to `max_retries` times → RateLimit |
/// | HTTP 500 | Retry once after 1s → Server |
/// | Cancellation | Immediate → Abort |
/// | Network failure | Immediate → Network |
/// | Anything else | Immediate → Unexpected |
///
/// Attempts are strictly sequential. A `202 Accepted` is a success here; the
/// scrape poller takes it from there.
pub async fn fetch_with_retry(
    client: &Client,
    url: &Url,
    auth: &Auth,
    options: &FetchOptions,
) -> Result<Response, LogoError> {
    let cancel = options.cancel.as_ref();
    let mut rate_limit_retries = 0u32;
    let mut server_error_retried = false;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!("Fetching {} (attempt {})", url.path(), attempt);

        let response = send_cancellable(authorized_get(client, url, auth), cancel).await?;
        let status = response.status();

        if status.is_success() {
            emit_warnings(response.headers(), options);
            return Ok(response);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let headers = response.headers();

                if headers.contains_key(header_names::QUOTA_LIMIT) {
                    let limit = header_u64(headers, header_names::QUOTA_LIMIT).unwrap_or(0);
                    let remaining = header_u64(headers, header_names::QUOTA_REMAINING).unwrap_or(0);
                    let retry_after = header_u64(headers, header_names::RETRY_AFTER).unwrap_or(0);
                    warn!("Monthly quota exceeded for {}", url.path());
                    return Err(LogoError::QuotaExceeded {
                        retry_after,
                        limit,
                        used: limit.saturating_sub(remaining),
                    });
                }

                let retry_after = header_u64(headers, header_names::RETRY_AFTER).unwrap_or(0);
                if rate_limit_retries < options.max_retries {
                    rate_limit_retries += 1;
                    let delay = rate_limit_delay(retry_after);
                    warn!(
                        "Rate limited on {}, retrying in {:?} ({}/{})",
                        url.path(),
                        delay,
                        rate_limit_retries,
                        options.max_retries
                    );
                    sleep_or_cancel(delay, cancel).await?;
                    continue;
                }

                return Err(LogoError::RateLimit {
                    retry_after,
                    remaining: header_u64(headers, header_names::RATE_LIMIT_REMAINING)
                        .unwrap_or(0),
                    reset: header_u64(headers, header_names::RATE_LIMIT_RESET).unwrap_or(0),
                });
            }

            StatusCode::INTERNAL_SERVER_ERROR if !server_error_retried => {
                server_error_retried = true;
                warn!(
                    "Server error on {}, retrying in {:?}",
                    url.path(),
                    SERVER_ERROR_RETRY_DELAY
                );
                sleep_or_cancel(SERVER_ERROR_RETRY_DELAY, cancel).await?;
                continue;
            }

            _ => return Err(classify_failure(response, url).await),
        }
    }
}

/// Maps a non-retryable failure response onto the error taxonomy
pub(crate) async fn classify_failure(response: Response, url: &Url) -> LogoError {
    let status = response.status();
    let body = error_body(response).await;

    match status {
        StatusCode::UNAUTHORIZED => LogoError::Authentication {
            message: if body.is_empty() {
                "Invalid or missing token".to_string()
            } else {
                body
            },
            status: Some(status.as_u16()),
        },
        StatusCode::FORBIDDEN => LogoError::Forbidden { reason: body },
        StatusCode::NOT_FOUND => LogoError::NotFound {
            domain: domain_from_path(url),
        },
        StatusCode::BAD_REQUEST => LogoError::BadRequest { message: body },
        StatusCode::INTERNAL_SERVER_ERROR => LogoError::Server {
            status: status.as_u16(),
            message: body,
        },
        s => LogoError::Unexpected {
            status: s.as_u16(),
            message: body,
        },
    }
}

/// Reads at most [`MAX_ERROR_BODY_CHARS`] characters of an error body
///
/// Stops pulling chunks once [`MAX_ERROR_BODY_BYTES`] have arrived.
async fn error_body(mut response: Response) -> String {
    let status = response.status();
    let mut bytes = Vec::new();
    while bytes.len() < MAX_ERROR_BODY_BYTES {
        match response.chunk().await {
            Ok(Some(chunk)) => bytes.extend_from_slice(&chunk),
            _ => break,
        }
    }
    bytes.truncate(MAX_ERROR_BODY_BYTES);

    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim();
    if text.is_empty() {
        return status.canonical_reason().unwrap_or_default().to_string();
    }
    text.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Emits warnings when fewer than 10% of a limit remains
///
/// Limits come from `X-RateLimit-Limit` / `X-Quota-Limit`, falling back to
/// the tier's ceilings. Nothing is emitted when the remaining-count header
/// is absent.
fn emit_warnings(headers: &HeaderMap, options: &FetchOptions) {
    let Some(callback) = &options.on_warning else {
        return;
    };

    if let Some(remaining) = header_u64(headers, header_names::RATE_LIMIT_REMAINING) {
        let limit = header_u64(headers, header_names::RATE_LIMIT_LIMIT)
            .filter(|l| *l > 0)
            .unwrap_or_else(|| options.tier.rate_limit());
        if below_threshold(remaining, limit) {
            warn!("Rate limit low: {}/{} requests remaining", remaining, limit);
            callback(&Warning::RateLimit { remaining, limit });
        }
    }

    if let Some(remaining) = header_u64(headers, header_names::QUOTA_REMAINING) {
        let limit = header_u64(headers, header_names::QUOTA_LIMIT)
            .filter(|l| *l > 0)
            .unwrap_or_else(|| options.tier.monthly_quota());
        if below_threshold(remaining, limit) {
            warn!("Monthly quota low: {}/{} requests remaining", remaining, limit);
            callback(&Warning::Quota { remaining, limit });
        }
    }
}

fn below_threshold(remaining: u64, limit: u64) -> bool {
    remaining.saturating_mul(10) < limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&UserAgentConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_below_threshold() {
        assert!(below_threshold(9, 100));
        assert!(!below_threshold(10, 100));
        assert!(!below_threshold(50, 100));
        assert!(below_threshold(0, 1));
        assert!(!below_threshold(0, 0));
    }

    #[test]
    fn test_auth_debug_hides_token() {
        let auth = Auth::Bearer("sk_live_supersecretvalue".to_string());
        let printed = format!("{:?}", auth);
        assert!(printed.contains("sk_live_"));
        assert!(!printed.contains("supersecret"));
    }

    #[test]
    fn test_authorized_get_appends_missing_token() {
        let client = Client::new();
        let url = Url::parse("https://logos.getquikturn.io/a.com?autoScrape=true").unwrap();

        let request = authorized_get(&client, &url, &Auth::Query("qt_x".into()))
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("autoScrape=true&token=qt_x"));

        let url = Url::parse("https://logos.getquikturn.io/a.com?token=qt_x").unwrap();
        let request = authorized_get(&client, &url, &Auth::Query("qt_x".into()))
            .build()
            .unwrap();
        assert_eq!(request.url().query(), Some("token=qt_x"));
    }

    #[test]
    fn test_authorized_get_bearer() {
        let client = Client::new();
        let url = Url::parse("https://logos.getquikturn.io/a.com").unwrap();
        let request = authorized_get(&client, &url, &Auth::Bearer("sk_x".into()))
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer sk_x"
        );
        assert_eq!(request.url().query(), None);
    }

    #[test]
    fn test_emit_warnings() {
        use std::sync::Mutex;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = FetchOptions {
            on_warning: Some(Arc::new(move |w: &Warning| sink.lock().unwrap().push(*w))),
            ..FetchOptions::default()
        };

        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", "5".parse().unwrap());
        headers.insert("x-quota-remaining", "400000".parse().unwrap());
        emit_warnings(&headers, &options);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Warning::RateLimit {
                remaining: 5,
                limit: 100
            }]
        );

        seen.lock().unwrap().clear();
        headers.insert("x-quota-remaining", "10".parse().unwrap());
        headers.insert("x-quota-limit", "1000".parse().unwrap());
        headers.insert("x-ratelimit-remaining", "50".parse().unwrap());
        emit_warnings(&headers, &options);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Warning::Quota {
                remaining: 10,
                limit: 1000
            }]
        );
    }

    #[test]
    fn test_no_warning_without_headers() {
        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = called.clone();
        let options = FetchOptions {
            on_warning: Some(Arc::new(move |_: &Warning| {
                flag.store(true, std::sync::atomic::Ordering::SeqCst)
            })),
            ..FetchOptions::default()
        };
        emit_warnings(&HeaderMap::new(), &options);
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_error_body_read_stops_at_limit() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        // Announces a 100 MiB body, sends 2 KiB of it, then stalls
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = "HTTP/1.1 400 Bad Request\r\nContent-Length: 104857600\r\n\r\n";
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&[b'x'; 2048]).await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let url = Url::parse(&format!("http://{}/a.com", addr)).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            fetch_with_retry(&Client::new(), &url, &Auth::None, &FetchOptions::default()),
        )
        .await
        .expect("error body read waited for the whole body");

        match result {
            Err(LogoError::BadRequest { message }) => assert_eq!(message, "x".repeat(256)),
            other => panic!("expected BadRequest, got {:?}", other.map(|r| r.status())),
        }
    }
}
