//! URL handling for the logo API
//!
//! This module provides domain validation and logo request URL construction.
//! Both are pure functions with no I/O.

mod builder;
mod domain;

pub use builder::{
    build_logo_url, resolve_format, resolve_theme, resolve_variant, resolve_width, LogoRequest,
};
pub use domain::{domain_from_path, normalize_domain, same_origin, validate_domain};

/// Production API base URL
pub const DEFAULT_BASE_URL: &str = "https://logos.getquikturn.io";

/// Width the server renders when no `size` parameter is sent
pub const DEFAULT_WIDTH: u32 = 128;

/// Width ceiling for publishable (browser) tokens
pub const MAX_PUBLIC_WIDTH: u32 = 800;

/// Width ceiling for secret (server) tokens
pub const MAX_SECRET_WIDTH: u32 = 1200;

/// Credential classes
///
/// The class decides how the token travels and how wide a logo may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    /// Browser-safe token sent as the `token` query parameter
    Publishable,
    /// Server-only token sent as `Authorization: Bearer ...`
    Secret,
}

impl TokenClass {
    /// Classifies a token by prefix
    ///
    /// `qt_` and `pk_` are publishable, `sk_` is secret. Anything else is
    /// unknown.
    pub fn of(token: &str) -> Option<Self> {
        if token.starts_with("sk_") {
            Some(Self::Secret)
        } else if token.starts_with("qt_") || token.starts_with("pk_") {
            Some(Self::Publishable)
        } else {
            None
        }
    }

    /// Returns the maximum permitted output width
    pub fn max_width(&self) -> u32 {
        match self {
            Self::Publishable => MAX_PUBLIC_WIDTH,
            Self::Secret => MAX_SECRET_WIDTH,
        }
    }

    /// Returns true if the token travels as a query parameter
    pub fn uses_query_token(&self) -> bool {
        matches!(self, Self::Publishable)
    }
}

/// Returns the short, loggable prefix of a token
pub(crate) fn token_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}
