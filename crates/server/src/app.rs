use std::time::Duration;

use axum::{
    http::{request::Parts, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use socialgate_auth::{
    build, mount_path, AuthError, ConfigError, Identity, ReturnTo, RouterConfig,
    FAILURE_MESSAGE,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use url::Url;

/// Create the application router with the login routes mounted under the
/// base URL's path.
pub fn create_app(config: RouterConfig) -> Result<Router, ConfigError> {
    let base_url = Url::parse(&config.base_url)
        .map_err(|_| ConfigError::InvalidBaseUrl(config.base_url.clone()))?;
    let mount = mount_path(&base_url);

    let providers = config.enabled_providers();
    let links = providers
        .iter()
        .map(|p| format!(r#"<li><a href="{mount}/{p}">Sign in with {p}</a></li>"#))
        .collect::<String>();
    let index_html = format!(
        "<!DOCTYPE html><html><head><title>socialgate</title></head>\
         <body><h1>socialgate</h1><ul>{links}</ul></body></html>"
    );

    let auth = build(config.on_success(welcome).on_failure(rejected))?;

    let app = Router::new().route("/", get(move || async move { Html(index_html) }));
    let app = if mount.is_empty() {
        app.merge(auth)
    } else {
        app.nest(&mount, auth)
    };

    Ok(app
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        )))
}

/// Echoes the identity; a real application would persist it and open a session.
async fn welcome(parts: Parts, identity: Identity) -> impl IntoResponse {
    let return_to = parts.extensions.get::<ReturnTo>().map(|r| r.0.clone());
    tracing::info!(
        provider = %identity.provider,
        user_id = %identity.provider_user_id,
        "demo login"
    );
    Json(serde_json::json!({
        "identity": identity,
        "returnTo": return_to,
    }))
}

/// Reports the error code only; details stay in the logs.
async fn rejected(_parts: Parts, error: AuthError) -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": FAILURE_MESSAGE, "code": error.code() })),
    )
}
