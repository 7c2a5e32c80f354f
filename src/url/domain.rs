use crate::LogoError;
use std::net::Ipv4Addr;
use url::Url;

/// Maximum length of a fully-qualified domain name
const MAX_DOMAIN_LENGTH: usize = 253;

/// Maximum length of a single DNS label
const MAX_LABEL_LENGTH: usize = 63;

/// Normalizes a domain string for lookup
///
/// Trims surrounding whitespace, lowercases, and strips a single trailing dot.
pub fn normalize_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    match lowered.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => lowered,
    }
}

/// Normalizes and validates a domain name
///
/// # Validation Order
///
/// 1. Normalize (trim, lowercase, strip trailing dot)
/// 2. Reject empty input
/// 3. Reject embedded protocol schemes (`https://...`)
/// 4. Reject embedded paths (`example.com/about`)
/// 5. Reject IPv4 literals and `localhost`
/// 6. Reject names longer than 253 characters
/// 7. Reject labels that are empty, longer than 63 characters, contain
///    characters outside `[a-z0-9-]`, or start/end with a hyphen
/// 8. Require at least two labels
///
/// # Returns
///
/// * `Ok(String)` - The normalized domain
/// * `Err(LogoError::DomainValidation)` - The domain was rejected
///
/// # Examples
///
/// ```
/// use quikturn_logos::url::validate_domain;
///
/// assert_eq!(validate_domain(" GitHub.COM. ").unwrap(), "github.com");
/// assert!(validate_domain("localhost").is_err());
/// ```
pub fn validate_domain(domain: &str) -> Result<String, LogoError> {
    let normalized = normalize_domain(domain);

    if normalized.is_empty() {
        return Err(LogoError::invalid_domain(domain, "Domain must not be empty"));
    }

    if normalized.contains("://") {
        return Err(LogoError::invalid_domain(
            domain,
            "Domain must not include a protocol scheme",
        ));
    }

    if normalized.contains('/') {
        return Err(LogoError::invalid_domain(domain, "Domain must not include a path"));
    }

    if normalized.parse::<Ipv4Addr>().is_ok() {
        return Err(LogoError::invalid_domain(
            domain,
            "IP addresses are not supported",
        ));
    }

    if normalized == "localhost" {
        return Err(LogoError::invalid_domain(domain, "localhost is not supported"));
    }

    if normalized.len() > MAX_DOMAIN_LENGTH {
        return Err(LogoError::invalid_domain(
            domain,
            format!("Domain exceeds {} characters", MAX_DOMAIN_LENGTH),
        ));
    }

    let labels: Vec<&str> = normalized.split('.').collect();
    for label in &labels {
        validate_label(domain, label)?;
    }

    if labels.len() < 2 {
        return Err(LogoError::invalid_domain(
            domain,
            "Domain must have at least two labels",
        ));
    }

    Ok(normalized)
}

fn validate_label(domain: &str, label: &str) -> Result<(), LogoError> {
    if label.is_empty() {
        return Err(LogoError::invalid_domain(domain, "Domain contains an empty label"));
    }

    if label.len() > MAX_LABEL_LENGTH {
        return Err(LogoError::invalid_domain(
            domain,
            format!("Label '{}' exceeds {} characters", label, MAX_LABEL_LENGTH),
        ));
    }

    if !label
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(LogoError::invalid_domain(
            domain,
            format!("Label '{}' contains invalid characters", label),
        ));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(LogoError::invalid_domain(
            domain,
            format!("Label '{}' must not start or end with a hyphen", label),
        ));
    }

    Ok(())
}

/// Extracts the requested domain from a logo URL's path
///
/// The logo endpoint is `{base}/{domain}`, so the domain is the last
/// non-empty path segment.
///
/// ```
/// use url::Url;
/// use quikturn_logos::url::domain_from_path;
///
/// let url = Url::parse("https://logos.getquikturn.io/github.com?size=64").unwrap();
/// assert_eq!(domain_from_path(&url), "github.com");
/// ```
pub fn domain_from_path(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default()
        .to_string()
}

/// Returns true if two URLs share scheme, host and port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
