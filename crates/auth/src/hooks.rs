//! Caller-supplied success and failure hooks.
//!
//! Hooks are the only place identities leave this crate. They receive the
//! request head and return the response to send, so persisting a user or
//! issuing an application session is entirely up to the caller.

use std::future::Future;
use std::sync::Arc;

use axum::{
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::future::{BoxFuture, FutureExt};
use socialgate_core::auth::{AuthError, Identity};

/// Body of the default failure response.
pub const FAILURE_MESSAGE: &str = "Authentication Failed";

pub type SuccessHook = Arc<dyn Fn(Parts, Identity) -> BoxFuture<'static, Response> + Send + Sync>;
pub type FailureHook = Arc<dyn Fn(Parts, AuthError) -> BoxFuture<'static, Response> + Send + Sync>;

/// Post-login path requested with `?return_to=` when the flow started.
///
/// Inserted into the request extensions handed to the success hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnTo(pub String);

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub on_success: Option<SuccessHook>,
    pub on_failure: Option<FailureHook>,
}

pub(crate) fn success_hook<F, Fut, R>(hook: F) -> SuccessHook
where
    F: Fn(Parts, Identity) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + 'static,
{
    Arc::new(move |parts, identity| {
        let fut = hook(parts, identity);
        async move { fut.await.into_response() }.boxed()
    })
}

pub(crate) fn failure_hook<F, Fut, R>(hook: F) -> FailureHook
where
    F: Fn(Parts, AuthError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + 'static,
{
    Arc::new(move |parts, error| {
        let fut = hook(parts, error);
        async move { fut.await.into_response() }.boxed()
    })
}

/// Identity as JSON, used when no success hook is configured.
pub fn default_success_response(identity: Identity) -> Response {
    Json(identity).into_response()
}

/// Generic 401, used when no failure hook is configured.
pub fn default_failure_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": FAILURE_MESSAGE })),
    )
        .into_response()
}
