//! Authorization-code grant plumbing shared by every provider.
//!
//! Builds authorization URLs with the `oauth2` crate and performs the
//! server-to-server requests with `reqwest`.

use std::time::Duration;

use oauth2::{basic::BasicClient, AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use reqwest::header::ACCEPT;
use serde_json::Value;
use socialgate_core::auth::{AuthError, Provider, Result, TokenSet};
use url::Url;

use crate::error::ConfigError;

/// Builds the outbound HTTP client.
///
/// Redirects are never followed and every request is bounded by `timeout`.
pub(crate) fn build_http_client(timeout: Duration) -> std::result::Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

pub(crate) fn parse_endpoint(provider: Provider, url: &str) -> std::result::Result<Url, ConfigError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(parsed),
        _ => Err(ConfigError::InvalidEndpoint {
            provider,
            url: url.to_string(),
        }),
    }
}

/// One provider's OAuth client registration.
#[derive(Debug, Clone)]
pub(crate) struct OAuthClient {
    provider: Provider,
    http: reqwest::Client,
    client: BasicClient,
    client_id: String,
    redirect_uri: String,
    token_endpoint: Url,
    scope: String,
}

impl OAuthClient {
    pub fn new(
        provider: Provider,
        http: reqwest::Client,
        client_id: &str,
        redirect_uri: String,
        authorization_endpoint: &str,
        token_endpoint: &str,
        scope: String,
    ) -> std::result::Result<Self, ConfigError> {
        let authorization = parse_endpoint(provider, authorization_endpoint)?;
        let token_endpoint = parse_endpoint(provider, token_endpoint)?;
        let redirect = RedirectUrl::new(redirect_uri.clone()).map_err(|_| ConfigError::InvalidEndpoint {
            provider,
            url: redirect_uri.clone(),
        })?;

        let client = BasicClient::new(
            ClientId::new(client_id.to_string()),
            None,
            AuthUrl::from_url(authorization),
            None,
        )
        .set_redirect_uri(redirect);

        Ok(Self {
            provider,
            http,
            client,
            client_id: client_id.to_string(),
            redirect_uri,
            token_endpoint,
            scope,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Authorization endpoint URL carrying `response_type=code`, the client
    /// registration, `scope` and `state`, plus `extra` parameters.
    pub fn authorization_url(
        &self,
        state: &str,
        pkce_challenge: Option<&str>,
        extra: &[(&'static str, &'static str)],
    ) -> Url {
        let state = state.to_string();
        // The scope string is joined up front because Meta separates scopes
        // with commas rather than spaces.
        let mut request = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scope(Scope::new(self.scope.clone()));

        if let Some(challenge) = pkce_challenge {
            request = request
                .add_extra_param("code_challenge", challenge.to_string())
                .add_extra_param("code_challenge_method", "S256");
        }
        for (name, value) in extra {
            request = request.add_extra_param(*name, *value);
        }

        let (url, _csrf) = request.url();
        url
    }

    /// Exchanges an authorization code at the token endpoint.
    ///
    /// Any transport failure, non-2xx status or unparseable body is a
    /// `TokenExchange` error.
    pub async fn exchange_code(
        &self,
        code: &str,
        client_secret: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenSet> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", client_secret),
        ];
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(self.token_endpoint.clone())
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(transport_error(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::TokenExchange(transport_error(&e)))?;

        if !status.is_success() {
            return Err(AuthError::TokenExchange(error_detail(status, &body)));
        }

        serde_json::from_str::<TokenSet>(&body)
            .map_err(|e| AuthError::TokenExchange(format!("malformed token response: {e}")))
    }

    /// Fetches a JSON profile with the access token as a bearer credential.
    ///
    /// Timeouts fail as `TokenExchange`; every other failure as `ProfileFetch`.
    pub async fn fetch_profile(&self, endpoint: &Url, access_token: &str) -> Result<Value> {
        let response = self
            .http
            .get(endpoint.clone())
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(profile_error)?;

        let status = response.status();
        let body = response.text().await.map_err(profile_error)?;

        if !status.is_success() {
            return Err(AuthError::ProfileFetch(error_detail(status, &body)));
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(profile @ Value::Object(_)) => Ok(profile),
            Ok(_) => Err(AuthError::ProfileFetch("profile is not a JSON object".to_string())),
            Err(e) => Err(AuthError::ProfileFetch(format!("malformed profile: {e}"))),
        }
    }
}

fn transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    }
}

fn profile_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::TokenExchange(transport_error(&e))
    } else {
        AuthError::ProfileFetch(transport_error(&e))
    }
}

/// Condenses an error response into one line.
///
/// Understands the standard `{"error", "error_description"}` body as well as
/// the Graph API's `{"error": {"message"}}`.
fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|v| match v.get("error") {
        Some(Value::String(code)) => Some(match v.get("error_description").and_then(Value::as_str) {
            Some(description) => format!("{code}: {description}"),
            None => code.clone(),
        }),
        Some(Value::Object(graph)) => graph
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    });

    match detail {
        Some(detail) => format!("status {}: {detail}", status.as_u16()),
        None => format!("status {}", status.as_u16()),
    }
}

/// Serves `router` on a loopback port and returns its base URL.
#[cfg(test)]
pub(crate) async fn spawn_test_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
