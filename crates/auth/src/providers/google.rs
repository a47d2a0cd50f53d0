//! Google OAuth 2.0 adapter.

use async_trait::async_trait;
use socialgate_core::auth::{
    callback_url, email_to_name, join_scopes, normalize_scopes, AuthError, Identity,
    ProfileHints, Provider, ProviderAdapter, Result, TokenSet,
};
use url::Url;

use super::{endpoints_or, string_field};
use crate::config::{GoogleConfig, ProviderEndpoints};
use crate::error::ConfigError;
use crate::oauth::{parse_endpoint, OAuthClient};

pub const AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

fn default_endpoints() -> ProviderEndpoints {
    ProviderEndpoints {
        authorization: AUTHORIZATION_ENDPOINT.to_string(),
        token: TOKEN_ENDPOINT.to_string(),
        userinfo: Some(USERINFO_ENDPOINT.to_string()),
        issuer: None,
    }
}

/// Google provider.
pub struct GoogleAdapter {
    oauth: OAuthClient,
    client_secret: String,
    userinfo: Url,
}

impl GoogleAdapter {
    pub fn new(
        config: &GoogleConfig,
        base_url: &Url,
        http: reqwest::Client,
    ) -> std::result::Result<Self, ConfigError> {
        let endpoints = endpoints_or(config.endpoints.as_ref(), default_endpoints());
        let userinfo = endpoints.userinfo.as_deref().unwrap_or(USERINFO_ENDPOINT);

        let oauth = OAuthClient::new(
            Provider::Google,
            http,
            &config.client_id,
            callback_url(base_url, Provider::Google),
            &endpoints.authorization,
            &endpoints.token,
            join_scopes(&normalize_scopes(&config.scopes), " "),
        )?;

        Ok(Self {
            oauth,
            client_secret: config.client_secret.clone(),
            userinfo: parse_endpoint(Provider::Google, userinfo)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        self.oauth.provider()
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn authorization_url(&self, state: &str, pkce_challenge: Option<&str>) -> Result<Url> {
        Ok(self
            .oauth
            .authorization_url(state, pkce_challenge, &[("access_type", "online")]))
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: Option<&str>) -> Result<TokenSet> {
        self.oauth
            .exchange_code(code, &self.client_secret, pkce_verifier)
            .await
    }

    async fn identity(&self, tokens: &TokenSet, _hints: &ProfileHints) -> Result<Identity> {
        let profile = self
            .oauth
            .fetch_profile(&self.userinfo, &tokens.access_token)
            .await?;

        let provider_user_id = string_field(&profile, "sub")
            .ok_or_else(|| AuthError::ProfileFetch("userinfo has no `sub`".to_string()))?;
        let email = string_field(&profile, "email");
        let display_name = string_field(&profile, "name")
            .or_else(|| email.as_deref().map(email_to_name));

        Ok(Identity {
            provider: Provider::Google,
            provider_user_id,
            display_name,
            emails: email.into_iter().collect(),
            raw_profile: profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn adapter(config: GoogleConfig) -> GoogleAdapter {
        let http = crate::oauth::build_http_client(Duration::from_secs(1)).unwrap();
        GoogleAdapter::new(&config, &Url::parse("https://x/auth").unwrap(), http).unwrap()
    }

    fn param(url: &Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_authorization_url_defaults() {
        let url = adapter(GoogleConfig::new("google-id", "google-secret"))
            .authorization_url("state123", Some("challenge"))
            .unwrap();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(url.path(), "/o/oauth2/v2/auth");
        assert_eq!(param(&url, "client_id").as_deref(), Some("google-id"));
        assert_eq!(
            param(&url, "redirect_uri").as_deref(),
            Some("https://x/auth/google/callback")
        );
        assert_eq!(param(&url, "scope").as_deref(), Some("email"));
        assert_eq!(param(&url, "state").as_deref(), Some("state123"));
        assert_eq!(param(&url, "access_type").as_deref(), Some("online"));
        assert_eq!(param(&url, "code_challenge_method").as_deref(), Some("S256"));
    }

    #[test]
    fn test_scopes_are_space_joined() {
        let url = adapter(GoogleConfig::new("id", "secret").with_scopes(["openid", "email", "profile"]))
            .authorization_url("s", None)
            .unwrap();

        assert_eq!(param(&url, "scope").as_deref(), Some("openid email profile"));
    }

    #[test]
    fn test_endpoint_override() {
        let config = GoogleConfig::new("id", "secret").with_endpoints(ProviderEndpoints {
            authorization: "http://127.0.0.1:4000/google/authorize".to_string(),
            token: "http://127.0.0.1:4000/google/token".to_string(),
            userinfo: Some("http://127.0.0.1:4000/google/userinfo".to_string()),
            issuer: None,
        });
        let adapter = adapter(config);
        let url = adapter.authorization_url("s", None).unwrap();

        assert_eq!(url.port(), Some(4000));
        assert_eq!(url.path(), "/google/authorize");
        assert_eq!(adapter.userinfo.path(), "/google/userinfo");
    }

    async fn profile_adapter(profile: serde_json::Value) -> GoogleAdapter {
        let router = axum::Router::new().route(
            "/userinfo",
            axum::routing::get(move || async move { axum::Json(profile) }),
        );
        let base = crate::oauth::spawn_test_server(router).await;
        adapter(GoogleConfig::new("id", "secret").with_endpoints(ProviderEndpoints {
            authorization: format!("{base}/authorize"),
            token: format!("{base}/token"),
            userinfo: Some(format!("{base}/userinfo")),
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
    async fn test_profile_without_sub_is_profile_fetch_error() {
        let adapter = profile_adapter(serde_json::json!({"email": "ada@example.com", "name": "Ada"})).await;

        let result = adapter.identity(&tokens(), &ProfileHints::default()).await;
        assert!(matches!(result, Err(AuthError::ProfileFetch(_))));
    }

    #[tokio::test]
    async fn test_identity_from_profile() {
        let adapter = profile_adapter(serde_json::json!({"sub": "1234", "name": "Ada", "email": "ada@example.com"})).await;

        let identity = adapter.identity(&tokens(), &ProfileHints::default()).await.unwrap();
        assert_eq!(identity.provider, Provider::Google);
        assert_eq!(identity.provider_user_id, "1234");
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
        assert_eq!(identity.emails, vec!["ada@example.com"]);
    }
}
