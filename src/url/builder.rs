use crate::url::domain::validate_domain;
use crate::url::{TokenClass, DEFAULT_BASE_URL, DEFAULT_WIDTH};
use crate::LogoError;
use url::Url;

/// Per-request logo options
///
/// Every field is optional. Unsupported `theme`, `format` and `variant`
/// values are dropped while building the URL so the server applies its own
/// default instead of failing the request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogoRequest {
    /// Output width in pixels
    pub size: Option<i64>,

    /// Alias for `size`, consulted only when `size` is unset
    pub width: Option<i64>,

    /// Render the logo in greyscale
    pub greyscale: bool,

    /// `light` or `dark`
    pub theme: Option<String>,

    /// MIME type (`image/webp`) or shorthand (`webp`)
    pub format: Option<String>,

    /// `full` or `icon`
    pub variant: Option<String>,

    /// Overrides the API base URL
    pub base_url: Option<Url>,
}

impl LogoRequest {
    /// Creates an empty request using all server defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn width(mut self, width: i64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn greyscale(mut self, greyscale: bool) -> Self {
        self.greyscale = greyscale;
        self
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Resolves the requested width for a token class
///
/// Uses `size`, then `width`, then the protocol default. Non-positive values
/// fall back to the default; everything else is clamped to
/// `[1, class.max_width()]`.
pub fn resolve_width(request: &LogoRequest, class: TokenClass) -> u32 {
    let requested = request.size.or(request.width).unwrap_or(DEFAULT_WIDTH as i64);
    if requested <= 0 {
        return DEFAULT_WIDTH;
    }
    requested.clamp(1, class.max_width() as i64) as u32
}

/// Maps a MIME type or shorthand alias onto the wire format name
pub fn resolve_format(format: &str) -> Option<&'static str> {
    match format.trim().to_lowercase().as_str() {
        "png" | "image/png" => Some("png"),
        "jpeg" | "jpg" | "image/jpeg" | "image/jpg" => Some("jpeg"),
        "webp" | "image/webp" => Some("webp"),
        "avif" | "image/avif" => Some("avif"),
        _ => None,
    }
}

/// Accepts only the supported themes
pub fn resolve_theme(theme: &str) -> Option<&'static str> {
    match theme.trim().to_lowercase().as_str() {
        "light" => Some("light"),
        "dark" => Some("dark"),
        _ => None,
    }
}

/// Accepts only the supported logo variants
pub fn resolve_variant(variant: &str) -> Option<&'static str> {
    match variant.trim().to_lowercase().as_str() {
        "full" => Some("full"),
        "icon" => Some("icon"),
        _ => None,
    }
}

/// Builds the logo request URL for a domain
///
/// The URL is `{base}/{domain}` with only non-default query parameters:
///
/// | Parameter | When serialized |
/// |-----------|-----------------|
/// | `token` | publishable tokens only (secret tokens travel in a header) |
/// | `size` | resolved width differs from the default |
/// | `greyscale` | `true` |
/// | `theme`, `format`, `variant` | value is supported |
/// | `autoScrape` | always `true` |
///
/// This function is pure; retry loops and pollers call it freely.
///
/// # Examples
///
/// ```
/// use quikturn_logos::url::{build_logo_url, LogoRequest, TokenClass};
///
/// let url = build_logo_url(
///     "GitHub.com",
///     Some("qt_abc"),
///     TokenClass::Publishable,
///     &LogoRequest::new().size(256).format("image/webp"),
/// )
/// .unwrap();
/// assert_eq!(
///     url.as_str(),
///     "https://logos.getquikturn.io/github.com?token=qt_abc&size=256&format=webp&autoScrape=true"
/// );
/// ```
pub fn build_logo_url(
    domain: &str,
    token: Option<&str>,
    class: TokenClass,
    request: &LogoRequest,
) -> Result<Url, LogoError> {
    let domain = validate_domain(domain)?;

    let mut url = match &request.base_url {
        Some(base) => base.clone(),
        None => Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| LogoError::invalid_domain(&domain, e.to_string()))?,
    };
    url.set_query(None);
    url.set_fragment(None);

    url.path_segments_mut()
        .map_err(|_| LogoError::invalid_domain(&domain, "Base URL cannot carry a path"))?
        .pop_if_empty()
        .push(&domain);

    let width = resolve_width(request, class);

    {
        let mut query = url.query_pairs_mut();

        if let (Some(token), TokenClass::Publishable) = (token, class) {
            if !token.is_empty() {
                query.append_pair("token", token);
            }
        }

        if width != DEFAULT_WIDTH {
            query.append_pair("size", &width.to_string());
        }

        if request.greyscale {
            query.append_pair("greyscale", "true");
        }

        if let Some(theme) = request.theme.as_deref().and_then(resolve_theme) {
            query.append_pair("theme", theme);
        }

        if let Some(format) = request.format.as_deref().and_then(resolve_format) {
            query.append_pair("format", format);
        }

        if let Some(variant) = request.variant.as_deref().and_then(resolve_variant) {
            query.append_pair("variant", variant);
        }

        query.append_pair("autoScrape", "true");
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(domain: &str, request: &LogoRequest) -> Url {
        build_logo_url(domain, Some("qt_test"), TokenClass::Publishable, request).unwrap()
    }

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_minimal_url() {
        let url = build("github.com", &LogoRequest::new());
        assert_eq!(
            url.as_str(),
            "https://logos.getquikturn.io/github.com?token=qt_test&autoScrape=true"
        );
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let a = build("GitHub.COM ", &LogoRequest::new());
        let b = build("github.com", &LogoRequest::new());
        assert_eq!(a, b);
        assert_eq!(a.path(), "/github.com");
    }

    #[test]
    fn test_idempotent() {
        let request = LogoRequest::new().size(300).theme("dark");
        assert_eq!(build("stripe.com", &request), build("stripe.com", &request));
    }

    #[test]
    fn test_non_positive_width_uses_default() {
        for width in [0, -1, -500] {
            let request = LogoRequest::new().size(width);
            assert_eq!(resolve_width(&request, TokenClass::Publishable), DEFAULT_WIDTH);
            assert_eq!(query_value(&build("a.com", &request), "size"), None);
        }
    }

    #[test]
    fn test_default_width_is_omitted() {
        let request = LogoRequest::new().size(DEFAULT_WIDTH as i64);
        assert_eq!(query_value(&build("a.com", &request), "size"), None);
    }

    #[test]
    fn test_width_clamped_per_token_class() {
        for width in [1, 64, 800, 801, 1200, 5000, i64::MAX] {
            let request = LogoRequest::new().size(width);
            let public = resolve_width(&request, TokenClass::Publishable);
            let secret = resolve_width(&request, TokenClass::Secret);
            assert!((1..=800).contains(&public), "public width {}", public);
            assert!((1..=1200).contains(&secret), "secret width {}", secret);
        }
        let request = LogoRequest::new().size(5000);
        assert_eq!(resolve_width(&request, TokenClass::Publishable), 800);
        assert_eq!(resolve_width(&request, TokenClass::Secret), 1200);
    }

    #[test]
    fn test_width_alias() {
        let request = LogoRequest::new().width(64);
        assert_eq!(query_value(&build("a.com", &request), "size").as_deref(), Some("64"));

        let request = LogoRequest::new().size(32).width(64);
        assert_eq!(query_value(&build("a.com", &request), "size").as_deref(), Some("32"));
    }

    #[test]
    fn test_format_aliases() {
        assert_eq!(resolve_format("image/webp"), Some("webp"));
        assert_eq!(resolve_format("WEBP"), Some("webp"));
        assert_eq!(resolve_format("jpg"), Some("jpeg"));
        assert_eq!(resolve_format("image/avif"), Some("avif"));
        assert_eq!(resolve_format("image/gif"), None);
    }

    #[test]
    fn test_unsupported_values_are_dropped() {
        let request = LogoRequest::new()
            .format("image/gif")
            .theme("sepia")
            .variant("wordmark");
        let url = build("a.com", &request);
        assert_eq!(query_value(&url, "format"), None);
        assert_eq!(query_value(&url, "theme"), None);
        assert_eq!(query_value(&url, "variant"), None);
        assert_eq!(query_value(&url, "autoScrape").as_deref(), Some("true"));
    }

    #[test]
    fn test_all_parameters() {
        let request = LogoRequest::new()
            .size(512)
            .greyscale(true)
            .theme("Dark")
            .format("png")
            .variant("icon");
        let url = build("a.com", &request);
        assert_eq!(
            url.query(),
            Some("token=qt_test&size=512&greyscale=true&theme=dark&format=png&variant=icon&autoScrape=true")
        );
    }

    #[test]
    fn test_secret_token_never_in_query() {
        let url = build_logo_url(
            "a.com",
            Some("sk_secret"),
            TokenClass::Secret,
            &LogoRequest::new().size(1000),
        )
        .unwrap();
        assert_eq!(query_value(&url, "token"), None);
        assert_eq!(query_value(&url, "size").as_deref(), Some("1000"));
    }

    #[test]
    fn test_base_url_override() {
        let base = Url::parse("http://127.0.0.1:8080/v1/").unwrap();
        let url = build("a.com", &LogoRequest::new().base_url(base));
        assert_eq!(url.path(), "/v1/a.com");
        assert_eq!(url.host_str(), Some("127.0.0.1"));

        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        let url = build("a.com", &LogoRequest::new().base_url(base));
        assert_eq!(url.path(), "/a.com");
    }

    #[test]
    fn test_invalid_domain_is_rejected() {
        let err = build_logo_url("localhost", None, TokenClass::Publishable, &LogoRequest::new())
            .unwrap_err();
        assert!(matches!(err, LogoError::DomainValidation { .. }));
    }
}
