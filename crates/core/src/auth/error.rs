use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-request authentication failures.
///
/// Every variant ends the flow with a redirect to the failure endpoint; none
/// of them is ever rendered to the browser verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum AuthError {
    /// Unknown, consumed, expired or foreign `state` parameter.
    #[error("state parameter does not match an active login attempt")]
    StateMismatch,

    #[error("failed to exchange authorization code: {0}")]
    TokenExchange(String),

    #[error("failed to fetch user profile: {0}")]
    ProfileFetch(String),

    /// The provider redirected back with an `error` parameter.
    #[error("provider denied the authorization request: {0}")]
    Denied(String),

    #[error("flow storage error: {0}")]
    Storage(String),

    /// The failure endpoint was reached without a recorded error.
    #[error("authentication failed")]
    Unknown,
}

impl AuthError {
    /// Stable machine-readable code, suitable for logs and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StateMismatch => "state_mismatch",
            Self::TokenExchange(_) => "token_exchange",
            Self::ProfileFetch(_) => "profile_fetch",
            Self::Denied(_) => "denied",
            Self::Storage(_) => "storage",
            Self::Unknown => "unknown",
        }
    }
}
