use crate::client::core::{ClientCore, ClientSettings, GetOptions};
use crate::client::events::{EventKind, SubscriptionId};
use crate::client::handles::{HandleStore, LocalResource};
use crate::fetch::Warning;
use crate::metadata::LogoMetadata;
use crate::url::{LogoRequest, TokenClass};
use crate::Result;
use tracing::debug;

/// A fetched logo exposed through a local handle
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserLogo {
    /// `blob:quikturn/<n>` handle, resolvable through the owning client
    pub url: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub metadata: LogoMetadata,
}

/// Logo client for untrusted environments
///
/// Requires a publishable (`qt_` or `pk_`) token, sent as the `token` query
/// parameter. Every successful `get` produces a handle owned by this client;
/// handles live until released, superseded, or [`BrowserClient::destroy`].
#[derive(Debug)]
pub struct BrowserClient {
    core: ClientCore,
    handles: HandleStore,
}

impl BrowserClient {
    /// Creates a client with default settings
    ///
    /// # Errors
    ///
    /// Returns `LogoError::Authentication` when the token is empty or is a
    /// secret token.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_settings(token, ClientSettings::default())
    }

    pub fn with_settings(token: &str, settings: ClientSettings) -> Result<Self> {
        Ok(Self {
            core: ClientCore::new(token, TokenClass::Publishable, settings)?,
            handles: HandleStore::new(),
        })
    }

    /// Returns the request URL for a domain without fetching it
    ///
    /// The URL embeds the token and can be used directly as an image source.
    pub fn url(&self, domain: &str, request: &LogoRequest) -> Result<String> {
        Ok(self.core.logo_url(domain, request)?.into())
    }

    /// Fetches one logo and stores it behind a local handle
    ///
    /// A repeat fetch of the same request releases the previous handle.
    pub async fn get(&self, domain: &str, options: &GetOptions) -> Result<BrowserLogo> {
        let source = self.core.logo_url(domain, &options.request)?;
        let response = self.core.fetch(domain, options).await?;

        let size_bytes = response.bytes.len();
        let url = self
            .handles
            .create(source.as_str(), response.bytes, &response.content_type);
        debug!("Stored logo for {} as {}", domain, url);

        Ok(BrowserLogo {
            url,
            content_type: response.content_type,
            size_bytes,
            metadata: response.metadata,
        })
    }

    /// Looks up the bytes behind a handle
    pub fn resolve(&self, handle: &str) -> Option<LocalResource> {
        self.handles.resolve(handle)
    }

    /// Releases one handle early
    pub fn release(&self, handle: &str) -> bool {
        self.handles.release(handle)
    }

    /// Number of live handles
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Warning) + Send + Sync + 'static,
    {
        self.core.events.subscribe(kind, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.core.events.unsubscribe(id)
    }

    /// Releases every handle and clears every subscription
    pub fn destroy(&self) {
        let released = self.handles.release_all();
        self.core.events.clear();
        debug!("Browser client destroyed, released {} handles", released);
    }
}

impl Drop for BrowserClient {
    fn drop(&mut self) {
        self.handles.release_all();
    }
}
