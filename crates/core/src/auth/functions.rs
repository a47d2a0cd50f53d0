use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};
use url::Url;

use super::{AuthFlowState, Provider};

/// Scope requested when a provider config does not list any.
pub const DEFAULT_SCOPE: &str = "email";

/// Generate a random state parameter for CSRF protection.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Check if a login attempt has outlived its TTL.
pub fn is_flow_expired(flow: &AuthFlowState, now: DateTime<Utc>, ttl: Duration) -> bool {
    flow.created_at + ttl <= now
}

/// Resolve which providers get routes.
///
/// An empty filter enables every configured provider. A non-empty filter is
/// intersected with the configured set, so naming an unconfigured provider
/// enables nothing for it.
pub fn enabled_providers(configured: &[Provider], filter: &[Provider]) -> Vec<Provider> {
    Provider::ALL
        .into_iter()
        .filter(|p| configured.contains(p))
        .filter(|p| filter.is_empty() || filter.contains(p))
        .collect()
}

/// Scopes to request, falling back to [`DEFAULT_SCOPE`].
pub fn normalize_scopes(scopes: &[String]) -> Vec<String> {
    let scopes: Vec<String> = scopes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if scopes.is_empty() {
        vec![DEFAULT_SCOPE.to_string()]
    } else {
        scopes
    }
}

pub fn join_scopes(scopes: &[String], separator: &str) -> String {
    scopes.join(separator)
}

/// Path component of the base URL without a trailing slash (`""` at root).
pub fn mount_path(base_url: &Url) -> String {
    base_url.path().trim_end_matches('/').to_string()
}

/// Absolute redirect URI registered with the provider.
pub fn callback_url(base_url: &Url, provider: Provider) -> String {
    format!(
        "{}/{}/callback",
        base_url.as_str().trim_end_matches('/'),
        provider
    )
}

/// Where failed attempts are sent, relative to the host.
pub fn failure_path(base_url: &Url) -> String {
    format!("{}/failure", mount_path(base_url))
}

/// Extract username from email if no name provided.
pub fn email_to_name(email: &str) -> String {
    match email.split('@').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "User".to_string(),
    }
}
