//! Request path shared by both clients

use crate::client::events::EventRegistry;
use crate::client::LogoResponse;
use crate::config::UserAgentConfig;
use crate::fetch::{
    build_http_client, fetch_with_retry, read_body_limited, resolve_scrape, Auth, FetchOptions,
    ProgressCallback, ScrapeOptions, WarningCallback, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_MAX_RETRIES, DEFAULT_SCRAPE_TIMEOUT,
};
use crate::metadata::{parse_metadata, Tier};
use crate::url::{build_logo_url, token_prefix, LogoRequest, TokenClass};
use crate::{LogoError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Content type assumed when the server omits one
const FALLBACK_CONTENT_TYPE: &str = "image/png";

/// Construction-time settings shared by both clients
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Overrides the production API base URL
    pub base_url: Option<Url>,
    pub max_retries: u32,
    pub tier: Tier,
    pub scrape_timeout: Duration,
    /// Bodies larger than this are rejected
    pub max_body_bytes: u64,
    pub user_agent: UserAgentConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            max_retries: DEFAULT_MAX_RETRIES,
            tier: Tier::default(),
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: UserAgentConfig::default(),
        }
    }
}

/// Per-call options for `get`
#[derive(Clone, Default)]
pub struct GetOptions {
    pub request: LogoRequest,
    pub cancel: Option<CancellationToken>,
    /// Overrides the client's scrape timeout for this call
    pub scrape_timeout: Option<Duration>,
    pub on_progress: Option<ProgressCallback>,
}

impl GetOptions {
    pub fn new(request: LogoRequest) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }
}

impl fmt::Debug for GetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetOptions")
            .field("request", &self.request)
            .field("cancel", &self.cancel)
            .field("scrape_timeout", &self.scrape_timeout)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Credential, HTTP client and settings bound together
pub(crate) struct ClientCore {
    http: Client,
    token: String,
    class: TokenClass,
    auth: Auth,
    settings: ClientSettings,
    pub(crate) events: Arc<EventRegistry>,
}

impl ClientCore {
    /// Validates the token against the class this client accepts
    pub(crate) fn new(token: &str, expected: TokenClass, settings: ClientSettings) -> Result<Self> {
        let token = token.trim();
        check_token_class(token, expected)?;

        let http = build_http_client(&settings.user_agent)?;
        let auth = match expected {
            TokenClass::Publishable => Auth::Query(token.to_string()),
            TokenClass::Secret => Auth::Bearer(token.to_string()),
        };

        debug!(
            "Created {:?} client with token {}…",
            expected,
            token_prefix(token)
        );

        Ok(Self {
            http,
            token: token.to_string(),
            class: expected,
            auth,
            settings,
            events: Arc::new(EventRegistry::new()),
        })
    }

    /// Builds the request URL without touching the network
    pub(crate) fn logo_url(&self, domain: &str, request: &LogoRequest) -> Result<Url> {
        let request = match (&request.base_url, &self.settings.base_url) {
            (None, Some(base)) => LogoRequest {
                base_url: Some(base.clone()),
                ..request.clone()
            },
            _ => request.clone(),
        };
        let token = self.class.uses_query_token().then_some(self.token.as_str());
        build_logo_url(domain, token, self.class, &request)
    }

    fn warning_callback(&self) -> WarningCallback {
        let events = self.events.clone();
        Arc::new(move |warning| events.emit(warning))
    }

    /// Fetches, polls if pending, then decodes one logo
    pub(crate) async fn fetch(&self, domain: &str, options: &GetOptions) -> Result<LogoResponse> {
        let url = self.logo_url(domain, &options.request)?;
        debug!("Fetching logo for {}", domain);
        let started = Instant::now();

        let fetch = FetchOptions {
            max_retries: self.settings.max_retries,
            tier: self.settings.tier,
            cancel: options.cancel.clone(),
            on_warning: Some(self.warning_callback()),
        };
        let response = fetch_with_retry(&self.http, &url, &self.auth, &fetch).await?;

        let scrape = ScrapeOptions {
            timeout: options.scrape_timeout.unwrap_or(self.settings.scrape_timeout),
            started: Some(started),
            on_progress: options.on_progress.clone(),
            fetch,
        };
        let response = resolve_scrape(&self.http, response, &url, &self.auth, &scrape).await?;

        let metadata = parse_metadata(response.headers());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        let bytes = read_body_limited(response, self.settings.max_body_bytes).await?;

        debug!(
            "Fetched {} bytes of {} for {} (cache {:?})",
            bytes.len(),
            content_type,
            domain,
            metadata.cache_status
        );

        Ok(LogoResponse {
            bytes,
            content_type,
            metadata,
        })
    }
}

impl fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCore")
            .field("class", &self.class)
            .field("auth", &self.auth)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Rejects empty tokens and tokens of the wrong class
pub(crate) fn check_token_class(token: &str, expected: TokenClass) -> Result<()> {
    let reject = |message: &str| {
        Err(LogoError::Authentication {
            message: message.to_string(),
            status: None,
        })
    };

    if token.is_empty() {
        return reject("Token is required");
    }

    match (TokenClass::of(token), expected) {
        (Some(class), expected) if class == expected => Ok(()),
        (Some(TokenClass::Secret), TokenClass::Publishable) => {
            reject("Secret tokens (sk_) must not be used with the browser client")
        }
        (Some(TokenClass::Publishable), TokenClass::Secret) => {
            reject("Server client requires a secret token (sk_)")
        }
        _ => reject("Unrecognized token format"),
    }
}
