//! Mock IdP server.
//!
//! Every provider gets the same three endpoints under its own prefix:
//! - `GET /{provider}/authorize` - login page
//! - `POST /{provider}/token` - code exchange
//! - `GET /{provider}/userinfo` - profile (Google, Meta)
//!
//! plus `POST /authorize/submit`, where the login page posts to. Codes and
//! access tokens are base64-encoded JSON describing the simulated user, so
//! the server keeps no state.

use std::net::SocketAddr;

use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use socialgate_core::auth::Provider;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::templates;
use crate::config::ProviderEndpoints;

/// HMAC secret the mock signs Apple `id_token`s with.
const ID_TOKEN_SECRET: &[u8] = b"socialgate-mock-idp";

/// Endpoint overrides pointing `provider` at a mock listening on `base`
/// (e.g. `http://127.0.0.1:3001`).
pub fn endpoints(base: &str, provider: Provider) -> ProviderEndpoints {
    let base = base.trim_end_matches('/');
    ProviderEndpoints {
        authorization: format!("{base}/{provider}/authorize"),
        token: format!("{base}/{provider}/token"),
        userinfo: match provider {
            Provider::Apple => None,
            _ => Some(format!("{base}/{provider}/userinfo")),
        },
        issuer: Some(base.to_string()),
    }
}

/// Simulated user carried in authorization codes and access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockCode {
    pub provider: Provider,
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    /// PKCE challenge sent to the authorize endpoint, checked on exchange.
    #[serde(default)]
    pub code_challenge: Option<String>,
}

impl MockCode {
    pub fn new(provider: Provider, email: &str, name: Option<&str>) -> Self {
        Self {
            provider,
            sub: format!("mock-{provider}-{email}"),
            email: email.to_string(),
            name: name.map(str::to_string),
            code_challenge: None,
        }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(code: &str) -> Option<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(code)
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

#[derive(Deserialize)]
struct AuthorizeQuery {
    state: String,
    redirect_uri: String,
    code_challenge: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    name: Option<String>,
    state: String,
    redirect_uri: String,
    provider: Provider,
    code_challenge: Option<String>,
}

#[derive(Deserialize)]
struct TokenForm {
    grant_type: String,
    code: String,
    client_id: String,
    code_verifier: Option<String>,
}

/// Mock IdP server that simulates provider OAuth endpoints.
pub struct MockIdpServer {
    port: u16,
}

impl MockIdpServer {
    /// Create a new Mock IdP server.
    ///
    /// # Arguments
    /// * `port` - The port to listen on, `0` for any free port
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn router() -> Router {
        Router::new()
            .route("/{provider}/authorize", get(authorize))
            .route("/{provider}/token", post(token))
            .route("/{provider}/userinfo", get(userinfo))
            .route("/authorize/submit", post(authorize_submit))
    }

    /// Run the Mock IdP server until the process exits.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Mock IdP server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, Self::router()).await
    }

    /// Binds and serves in the background, returning the bound address.
    pub async fn spawn(self) -> Result<(SocketAddr, JoinHandle<()>), std::io::Error> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, Self::router()).await {
                tracing::error!(error = %e, "mock IdP server stopped");
            }
        });

        Ok((local, handle))
    }
}

async fn authorize(
    Path(provider): Path<Provider>,
    Query(params): Query<AuthorizeQuery>,
) -> Html<String> {
    Html(templates::login_page(
        provider,
        &params.state,
        &params.redirect_uri,
        params.code_challenge.as_deref(),
    ))
}

async fn authorize_submit(Form(form): Form<LoginForm>) -> Response {
    let mut code = MockCode::new(form.provider, &form.email, form.name.as_deref());
    code.code_challenge = form.code_challenge.filter(|c| !c.is_empty());
    let code = code.encode();

    // Apple uses form_post response mode - return auto-submitting form
    if form.provider == Provider::Apple {
        let user = form.name.as_deref().map(|name| apple_user_json(name, &form.email));
        let html = templates::form_post_page(&form.redirect_uri, &code, &form.state, user.as_deref());
        return Html(html).into_response();
    }

    let callback_url = format!(
        "{}?code={}&state={}",
        form.redirect_uri,
        urlencoding::encode(&code),
        urlencoding::encode(&form.state),
    );
    (StatusCode::FOUND, [(header::LOCATION, callback_url)]).into_response()
}

/// The `user` field Apple posts on first sign-in.
fn apple_user_json(name: &str, email: &str) -> String {
    let mut parts = name.splitn(2, ' ');
    let first = parts.next().unwrap_or_default();
    let last = parts.next().unwrap_or_default();
    json!({
        "name": { "firstName": first, "lastName": last },
        "email": email,
    })
    .to_string()
}

fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({ "error": error, "error_description": description })),
    )
        .into_response()
}

async fn token(
    Path(provider): Path<Provider>,
    headers: HeaderMap,
    Form(form): Form<TokenForm>,
) -> Response {
    if form.grant_type != "authorization_code" {
        return oauth_error(StatusCode::BAD_REQUEST, "unsupported_grant_type", "expected authorization_code");
    }

    let Some(code) = MockCode::decode(&form.code).filter(|c| c.provider == provider) else {
        return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "unknown authorization code");
    };

    if let Some(challenge) = &code.code_challenge {
        let verified = form.code_verifier.as_deref().is_some_and(|verifier| {
            let digest = Sha256::digest(verifier.as_bytes());
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest) == *challenge
        });
        if !verified {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "PKCE verification failed");
        }
    }

    let mut body = json!({
        "access_token": code.encode(),
        "token_type": "Bearer",
        "expires_in": 3600,
    });

    if provider == Provider::Apple {
        let issuer = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(|host| format!("http://{host}"))
            .unwrap_or_default();
        let now = Utc::now().timestamp();
        let claims = json!({
            "iss": issuer,
            "aud": form.client_id,
            "sub": code.sub,
            "email": code.email,
            "iat": now,
            "exp": now + 600,
        });
        match encode(&Header::default(), &claims, &EncodingKey::from_secret(ID_TOKEN_SECRET)) {
            Ok(id_token) => body["id_token"] = json!(id_token),
            Err(e) => {
                return oauth_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", &e.to_string())
            }
        }
    }

    Json(body).into_response()
}

async fn userinfo(Path(provider): Path<Provider>, headers: HeaderMap) -> Response {
    let code = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(MockCode::decode)
        .filter(|c| c.provider == provider);

    let Some(code) = code else {
        return oauth_error(StatusCode::UNAUTHORIZED, "invalid_token", "unknown access token");
    };

    let profile = match provider {
        Provider::Meta => json!({
            "id": code.sub,
            "name": code.name,
            "email": code.email,
        }),
        _ => json!({
            "sub": code.sub,
            "name": code.name,
            "email": code.email,
            "email_verified": true,
        }),
    };

    Json(profile).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip_is_url_safe() {
        let code = MockCode::new(Provider::Google, "dev+test@example.com", Some("Dev User"));
        let encoded = code.encode();

        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(MockCode::decode(&encoded), Some(code));
        assert_eq!(MockCode::decode("%%%"), None);
    }

    #[test]
    fn test_endpoints_layout() {
        let google = endpoints("http://127.0.0.1:3001/", Provider::Google);
        assert_eq!(google.authorization, "http://127.0.0.1:3001/google/authorize");
        assert_eq!(google.userinfo.as_deref(), Some("http://127.0.0.1:3001/google/userinfo"));

        let apple = endpoints("http://127.0.0.1:3001", Provider::Apple);
        assert_eq!(apple.token, "http://127.0.0.1:3001/apple/token");
        assert_eq!(apple.userinfo, None);
        assert_eq!(apple.issuer.as_deref(), Some("http://127.0.0.1:3001"));
    }

    #[test]
    fn test_apple_user_json() {
        let user: serde_json::Value =
            serde_json::from_str(&apple_user_json("Ada Lovelace", "ada@example.com")).unwrap();
        assert_eq!(user["name"]["firstName"], "Ada");
        assert_eq!(user["name"]["lastName"], "Lovelace");
    }

    #[tokio::test]
    async fn test_token_rejects_bad_pkce_verifier() {
        let (addr, _handle) = MockIdpServer::new(0).spawn().await.unwrap();
        let mut code = MockCode::new(Provider::Google, "dev@example.com", None);
        code.code_challenge = Some("expected-challenge".to_string());

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/google/token"))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code.encode().as_str()),
                ("client_id", "id"),
                ("code_verifier", "wrong"),
            ])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "invalid_grant");
    }
}
