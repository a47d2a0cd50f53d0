use url::Url;

/// Validates a post-login `return_to` target to prevent open redirects.
///
/// Returns `Some(url)` only for same-origin relative paths: a single leading
/// `/`, no `//` prefix, no scheme, no control characters and no backslashes.
/// Browsers read `\` as `/`, so `/\evil.com` is as protocol-relative as
/// `//evil.com`.
///
/// # Examples
///
/// ```
/// use socialgate_core::auth::validate_return_to;
///
/// assert_eq!(validate_return_to("/dashboard"), Some("/dashboard"));
/// assert_eq!(validate_return_to("//evil.com"), None);
/// assert_eq!(validate_return_to("/\\evil.com"), None);
/// assert_eq!(validate_return_to("https://evil.com"), None);
/// ```
pub fn validate_return_to(url: &str) -> Option<&str> {
    if !url.starts_with('/') || url.starts_with("//") {
        return None;
    }

    if url.chars().any(|c| c.is_control() || c == '\\') {
        return None;
    }

    if url.contains("://") {
        return None;
    }

    Some(url)
}

/// Parses the router's base URL.
///
/// The base URL is what redirect URIs are built from, so it must be an
/// absolute `http`/`https` URL with a host and without query or fragment.
///
/// ```
/// use socialgate_core::auth::parse_base_url;
///
/// assert!(parse_base_url("https://example.com/auth").is_some());
/// assert!(parse_base_url("/auth").is_none());
/// ```
pub fn parse_base_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;

    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return None;
    }

    if url.query().is_some() || url.fragment().is_some() {
        return None;
    }

    Some(url)
}
