//! Router assembly and HTTP handlers for the login routes.

use axum::{
    extract::{rejection::QueryRejection, FromRequest, Query, Request, State},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use chrono::Utc;
use oauth2::PkceCodeChallenge;
use serde::Deserialize;
use socialgate_core::auth::{
    generate_state, validate_return_to, AuthError, AuthFlowState, Identity, ProfileHints,
    Provider, ProviderAdapter,
};
use tower_cookies::{CookieManagerLayer, Cookies};
use url::Url;

use crate::config::RouterConfig;
use crate::error::ConfigError;
use crate::flows::spawn_sweeper;
use crate::hooks::{default_failure_response, default_success_response, ReturnTo};
use crate::providers::parse_user_name;
use crate::AuthState;

/// Query parameters accepted by the start route.
#[derive(Debug, Default, Deserialize)]
pub struct StartQuery {
    /// Path to come back to once logged in.
    pub return_to: Option<String>,
}

/// Parameters a provider sends back to the callback route, either in the
/// query string or (Apple) as a form body.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// Apple only: JSON with the user's name, sent on first sign-in.
    pub user: Option<String>,
}

/// Builds the login router described by `config`.
///
/// Routes, relative to wherever the router is nested:
/// - `GET /{provider}` - start a login
/// - `GET /{provider}/callback` - provider redirect (Apple: `POST`, and `GET`)
/// - `GET /failure` - terminal failure endpoint
///
/// Only enabled providers get routes.
///
/// # Errors
///
/// Any configuration problem is returned before a route is registered.
pub fn build(config: RouterConfig) -> Result<Router, ConfigError> {
    let sweep_interval = config.sweep_interval.unwrap_or(config.flow_ttl);
    let state = AuthState::from_config(config)?;

    let mut router = Router::new();
    for provider in state.providers() {
        let start_handler = move |State(state): State<AuthState>,
                                  cookies: Cookies,
                                  query: Result<Query<StartQuery>, QueryRejection>| async move {
            let return_to = query.ok().and_then(|Query(q)| q.return_to);
            start(state, cookies, provider, return_to).await
        };
        let callback_handler =
            move |State(state): State<AuthState>, cookies: Cookies, request: Request| async move {
                callback(state, cookies, provider, request).await
            };

        let callback_route = match provider {
            Provider::Apple => get(callback_handler.clone()).post(callback_handler),
            _ => get(callback_handler),
        };

        router = router
            .route(&format!("/{provider}"), get(start_handler))
            .route(&format!("/{provider}/callback"), callback_route);
        tracing::info!(%provider, "registered login routes");
    }
    router = router.route("/failure", get(failure));

    if sweep_interval.is_zero() {
        tracing::warn!("zero sweep interval, flow sweeper not started");
    } else if tokio::runtime::Handle::try_current().is_ok() {
        spawn_sweeper(state.flows.clone(), sweep_interval);
    } else {
        tracing::warn!("no tokio runtime, flow sweeper not started");
    }

    Ok(router.layer(CookieManagerLayer::new()).with_state(state))
}

/// 302 to `location`.
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn start(
    state: AuthState,
    cookies: Cookies,
    provider: Provider,
    return_to: Option<String>,
) -> Response {
    match begin(&state, &cookies, provider, return_to).await {
        Ok(url) => found(url.as_str()),
        Err(error) => fail(&state, &cookies, provider, error).await,
    }
}

async fn begin(
    state: &AuthState,
    cookies: &Cookies,
    provider: Provider,
    return_to: Option<String>,
) -> Result<Url, AuthError> {
    let adapter = state.adapter(provider).ok_or(AuthError::Unknown)?;
    let csrf_state = generate_state();

    let (challenge, verifier) = if adapter.uses_pkce() {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        (
            Some(challenge.as_str().to_string()),
            Some(verifier.secret().to_string()),
        )
    } else {
        (None, None)
    };

    let mut flow = AuthFlowState::new(provider, Utc::now());
    // Validate return_to to prevent open redirects
    flow.return_to = return_to
        .as_deref()
        .and_then(validate_return_to)
        .map(String::from);
    flow.pkce_verifier = verifier;

    let url = adapter.authorization_url(&csrf_state, challenge.as_deref())?;
    state.flows.insert_flow(&csrf_state, &flow).await?;
    state.session.set_flow(cookies, provider, &csrf_state);

    tracing::debug!(%provider, "starting login");
    Ok(url)
}

async fn callback(state: AuthState, cookies: Cookies, provider: Provider, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();

    let params = read_callback_params(&parts, body).await;
    let outcome = match params {
        Ok(params) => complete(&state, &cookies, provider, params).await,
        Err(rejection) => {
            tracing::debug!(%provider, %rejection, "unreadable callback parameters");
            Err(AuthError::StateMismatch)
        }
    };

    match outcome {
        Ok((identity, return_to)) => {
            tracing::info!(%provider, user_id = %identity.provider_user_id, "login succeeded");
            if let Some(path) = return_to {
                parts.extensions.insert(ReturnTo(path));
            }
            match &state.hooks.on_success {
                Some(hook) => hook(parts, identity).await,
                None => default_success_response(identity),
            }
        }
        Err(error) => fail(&state, &cookies, provider, error).await,
    }
}

/// Query string on `GET`, form body on `POST`.
async fn read_callback_params(parts: &Parts, body: axum::body::Body) -> Result<CallbackParams, String> {
    if parts.method == Method::POST {
        let request = Request::from_parts(parts.clone(), body);
        Form::<CallbackParams>::from_request(request, &())
            .await
            .map(|Form(params)| params)
            .map_err(|rejection| rejection.body_text())
    } else {
        Query::<CallbackParams>::try_from_uri(&parts.uri)
            .map(|Query(params)| params)
            .map_err(|rejection| rejection.body_text())
    }
}

async fn complete(
    state: &AuthState,
    cookies: &Cookies,
    provider: Provider,
    params: CallbackParams,
) -> Result<(Identity, Option<String>), AuthError> {
    // Always consume the flow cookie, whatever the outcome.
    let bound_state = state.session.take_flow(cookies, provider);

    if let Some(error) = params.error {
        let detail = match params.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        return Err(AuthError::Denied(detail));
    }

    let returned_state = params.state.ok_or(AuthError::StateMismatch)?;
    if bound_state.as_deref() != Some(returned_state.as_str()) {
        return Err(AuthError::StateMismatch);
    }

    let flow = state
        .flows
        .take_flow(&returned_state)
        .await?
        .filter(|flow| flow.provider == provider)
        .ok_or(AuthError::StateMismatch)?;

    let code = params
        .code
        .ok_or_else(|| AuthError::TokenExchange("callback carries no code".to_string()))?;

    let adapter = state.adapter(provider).ok_or(AuthError::Unknown)?;
    let tokens = adapter
        .exchange_code(&code, flow.pkce_verifier.as_deref())
        .await?;

    let hints = ProfileHints {
        display_name: params.user.as_deref().and_then(parse_user_name),
    };
    let identity = adapter.identity(&tokens, &hints).await?;

    Ok((identity, flow.return_to))
}

/// Parks `error` for the failure endpoint and redirects there.
async fn fail(state: &AuthState, cookies: &Cookies, provider: Provider, error: AuthError) -> Response {
    tracing::warn!(%provider, code = error.code(), %error, "login failed");

    let id = generate_state();
    match state.flows.insert_failure(&id, &error).await {
        Ok(()) => state.session.set_failure(cookies, &id),
        Err(e) => tracing::error!(error = %e, "failed to record login failure"),
    }
    state.session.take_flow(cookies, provider);

    found(&state.failure_path)
}

async fn failure(State(state): State<AuthState>, cookies: Cookies, request: Request) -> Response {
    let (parts, _body) = request.into_parts();

    let error = match state.session.take_failure(&cookies) {
        Some(id) => match state.flows.take_failure(&id).await {
            Ok(Some(error)) => error,
            Ok(None) => AuthError::Unknown,
            Err(e) => {
                tracing::error!(error = %e, "failed to load login failure");
                AuthError::Unknown
            }
        },
        None => AuthError::Unknown,
    };

    match &state.hooks.on_failure {
        Some(hook) => hook(parts, error).await,
        None => default_failure_response(),
    }
}
