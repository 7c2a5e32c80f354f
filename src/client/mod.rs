//! Client facades
//!
//! [`ServerClient`] and [`BrowserClient`] bind one credential to the URL
//! builder, fetch pipeline and scrape poller. Both validate the token class
//! at construction, poll pending scrapes on every request, cap the decoded
//! body size and expose warning subscriptions.
//!
//! # Example
//!
//! ```no_run
//! use quikturn_logos::client::{GetOptions, ServerClient};
//!
//! # async fn example() -> quikturn_logos::Result<()> {
//! let client = ServerClient::new("sk_live_example")?;
//! let logo = client.get("github.com", &GetOptions::default()).await?;
//! println!("{} bytes of {}", logo.bytes.len(), logo.content_type);
//! # Ok(())
//! # }
//! ```

mod browser;
mod core;
pub mod events;
pub mod handles;
mod server;

pub use self::core::{ClientSettings, GetOptions};
pub use browser::{BrowserClient, BrowserLogo};
pub use events::{EventKind, EventRegistry, SubscriptionId};
pub use handles::{HandleStore, LocalResource};
pub use server::{GetManyOptions, ServerClient};

use crate::metadata::LogoMetadata;

/// A decoded logo with its response metadata
#[derive(Debug, Clone, PartialEq)]
pub struct LogoResponse {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub metadata: LogoMetadata,
}
