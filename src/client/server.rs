use crate::batch::{fetch_batch, BatchOptions, BatchStream};
use crate::client::core::{ClientCore, ClientSettings, GetOptions};
use crate::client::events::{EventKind, SubscriptionId};
use crate::client::LogoResponse;
use crate::fetch::Warning;
use crate::url::{LogoRequest, TokenClass};
use crate::Result;
use std::sync::Arc;
use tracing::debug;

/// Options for [`ServerClient::get_many`]
#[derive(Debug, Clone, Default)]
pub struct GetManyOptions {
    /// Applied to every domain in the batch
    pub get: GetOptions,
    pub batch: BatchOptions,
}

/// Logo client for trusted environments
///
/// Requires a secret (`sk_`) token, sent as a bearer header. Cloning is cheap
/// and clones share subscriptions.
#[derive(Debug, Clone)]
pub struct ServerClient {
    core: Arc<ClientCore>,
}

impl ServerClient {
    /// Creates a client with default settings
    ///
    /// # Errors
    ///
    /// Returns `LogoError::Authentication` when the token is empty or is not
    /// a secret token.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_settings(token, ClientSettings::default())
    }

    pub fn with_settings(token: &str, settings: ClientSettings) -> Result<Self> {
        let core = ClientCore::new(token, TokenClass::Secret, settings)?;
        Ok(Self {
            core: Arc::new(core),
        })
    }

    /// Returns the request URL for a domain without fetching it
    pub fn url(&self, domain: &str, request: &LogoRequest) -> Result<String> {
        Ok(self.core.logo_url(domain, request)?.into())
    }

    /// Fetches one logo as raw bytes
    pub async fn get(&self, domain: &str, options: &GetOptions) -> Result<LogoResponse> {
        self.core.fetch(domain, options).await
    }

    /// Fetches many logos through the batch orchestrator
    ///
    /// The batch cancel token also cancels in-flight requests unless the
    /// per-request options carry their own.
    pub fn get_many(&self, domains: Vec<String>, options: GetManyOptions) -> BatchStream<LogoResponse> {
        let GetManyOptions { mut get, batch } = options;
        if get.cancel.is_none() {
            get.cancel = batch.cancel.clone();
        }
        debug!("Starting batch of {} domains", domains.len());

        let core = self.core.clone();
        fetch_batch(
            domains,
            move |domain: String| {
                let core = core.clone();
                let get = get.clone();
                async move { core.fetch(&domain, &get).await }
            },
            batch,
        )
    }

    /// Subscribes to a warning event
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Warning) + Send + Sync + 'static,
    {
        self.core.events.subscribe(kind, handler)
    }

    /// Removes a subscription
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.core.events.unsubscribe(id)
    }

    /// Clears every subscription
    pub fn destroy(&self) {
        self.core.events.clear();
    }
}
