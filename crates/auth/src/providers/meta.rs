//! Meta (Facebook Login) adapter.

use async_trait::async_trait;
use socialgate_core::auth::{
    callback_url, email_to_name, join_scopes, normalize_scopes, AuthError, Identity,
    ProfileHints, Provider, ProviderAdapter, Result, TokenSet,
};
use url::Url;

use super::{endpoints_or, string_field};
use crate::config::{MetaConfig, ProviderEndpoints};
use crate::error::ConfigError;
use crate::oauth::{parse_endpoint, OAuthClient};

pub const AUTHORIZATION_ENDPOINT: &str = "https://www.facebook.com/v19.0/dialog/oauth";
pub const TOKEN_ENDPOINT: &str = "https://graph.facebook.com/v19.0/oauth/access_token";
pub const PROFILE_ENDPOINT: &str =
    "https://graph.facebook.com/v19.0/me?fields=id,name,email,first_name,last_name";

fn default_endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        authorization: AUTHORIZATION_ENDPOINT.to_string(),
        token: TOKEN_ENDPOINT.to_string(),
        userinfo: Some(PROFILE_ENDPOINT.to_string()),
        issuer: None,
    }
}

/// Meta provider.
///
/// Facebook Login has no PKCE support for web apps and expects its scopes
/// comma-separated.
pub struct MetaAdapter {
    oauth: OAuthClient,
    client_secret: String,
    profile: Url,
}

impl MetaAdapter {
    pub fn new(
        config: &MetaConfig,
        base_url: &Url,
        http: reqwest::Client,
    ) -> std::result::Result<Self, ConfigError> {
        let endpoints = endpoints_or(config.endpoints.as_ref(), default_endpoints());
        let profile = endpoints.userinfo.as_deref().unwrap_or(PROFILE_ENDPOINT);

        let oauth = OAuthClient::new(
            Provider::Meta,
            http,
            &config.client_id,
            callback_url(base_url, Provider::Meta),
            &endpoints.authorization,
            &endpoints.token,
            join_scopes(&normalize_scopes(&config.scopes), ","),
        )?;

        Ok(Self {
            oauth,
            client_secret: config.client_secret.clone(),
            profile: parse_endpoint(Provider::Meta, profile)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for MetaAdapter {
    fn provider(&self) -> Provider {
        self.oauth.provider()
    }

    fn uses_pkce(&self) -> bool {
        false
    }

    fn authorization_url(&self, state: &str, _pkce_challenge: Option<&str>) -> Result<Url> {
        Ok(self.oauth.authorization_url(state, None, &[]))
    }

    async fn exchange_code(&self, code: &str, _pkce_verifier: Option<&str>) -> Result<TokenSet> {
        self.oauth
            .exchange_code(code, &self.client_secret, None)
            .await
    }

    async fn identity(&self, tokens: &TokenSet, _hints: &ProfileHints) -> Result<Identity> {
        let profile = self
            .oauth
            .fetch_profile(&self.profile, &tokens.access_token)
            .await?;

        let provider_user_id = string_field(&profile, "id")
            .ok_or_else(|| AuthError::ProfileFetch("profile has no `id`".to_string()))?;
        let email = string_field(&profile, "email");
        let display_name = string_field(&profile, "name")
            .or_else(|| full_name(&profile))
            .or_else(|| email.as_deref().map(email_to_name));

        Ok(Identity {
            provider: Provider::Meta,
            provider_user_id,
            display_name,
            emails: email.into_iter().collect(),
            raw_profile: profile,
        })
    }
}

fn full_name(profile: &serde_json::Value) -> Option<String> {
    let parts: Vec<String> = ["first_name", "last_name"]
        .into_iter()
        .filter_map(|key| string_field(profile, key))
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn adapter(config: MetaConfig) -> MetaAdapter {
        let http = crate::oauth::build_http_client(Duration::from_secs(1)).unwrap();
        MetaAdapter::new(&config, &Url::parse("https://x/auth").unwrap(), http).unwrap()
    }

    fn param(url: &Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_authorization_url_defaults() {
        let url = adapter(MetaConfig::new("app-id", "app-secret"))
            .authorization_url("state123", Some("ignored"))
            .unwrap();

        assert_eq!(url.host_str(), Some("www.facebook.com"));
        assert_eq!(url.path(), "/v19.0/dialog/oauth");
        assert_eq!(
            param(&url, "redirect_uri").as_deref(),
            Some("https://x/auth/meta/callback")
        );
        assert_eq!(param(&url, "scope").as_deref(), Some("email"));
        assert_eq!(param(&url, "code_challenge"), None);
    }

    #[test]
    fn test_scopes_are_comma_joined() {
        let url = adapter(MetaConfig::new("id", "secret").with_scopes(["email", "public_profile"]))
            .authorization_url("s", None)
            .unwrap();

        assert_eq!(param(&url, "scope").as_deref(), Some("email,public_profile"));
    }

    #[test]
    fn test_default_profile_endpoint_requests_fields() {
        let adapter = adapter(MetaConfig::new("id", "secret"));
        let fields = adapter
            .profile
            .query_pairs()
            .find(|(k, _)| k == "fields")
            .map(|(_, v)| v.into_owned());
        assert_eq!(fields.as_deref(), Some("id,name,email,first_name,last_name"));
    }

    #[test]
    fn test_full_name_from_parts() {
        assert_eq!(
            full_name(&json!({"first_name": "Ada", "last_name": "Lovelace"})).as_deref(),
            Some("Ada Lovelace")
        );
        assert_eq!(full_name(&json!({"last_name": "Lovelace"})).as_deref(), Some("Lovelace"));
        assert_eq!(full_name(&json!({})), None);
    }

    async fn profile_adapter(profile: serde_json::Value) -> MetaAdapter {
        let router = axum::Router::new().route(
            "/me",
            axum::routing::get(move || async move { axum::Json(profile) }),
        );
        let base = crate::oauth::spawn_test_server(router).await;
        adapter(MetaConfig::new("id", "secret").with_endpoints(ProviderEndpoints {
            authorization: format!("{base}/authorize"),
            token: format!("{base}/token"),
            userinfo: Some(format!("{base}/me")),
            issuer: None,
        }))
    }

    fn tokens() -> TokenSet {
        TokenSet {
            access_token: "token".to_string(),
            token_type: None,
            expires_in: None,
            refresh_token: None,
            id_token: None,
            scope: None,
        }
    }

    #[tokio::test]
    async fn test_profile_without_id_is_profile_fetch_error() {
        let adapter = profile_adapter(serde_json::json!({"email": "ada@example.com", "name": "Ada"})).await;

        let result = adapter.identity(&tokens(), &ProfileHints::default()).await;
        assert!(matches!(result, Err(AuthError::ProfileFetch(_))));
    }

    #[tokio::test]
    async fn test_identity_from_profile() {
        let adapter = profile_adapter(serde_json::json!({"id": 1234, "name": "Ada", "email": "ada@example.com"})).await;

        let identity = adapter.identity(&tokens(), &ProfileHints::default()).await.unwrap();
        assert_eq!(identity.provider, Provider::Meta);
        assert_eq!(identity.provider_user_id, "1234");
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
        assert_eq!(identity.emails, vec!["ada@example.com"]);
    }
}
