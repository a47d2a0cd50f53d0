use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported identity providers.
///
/// The set is closed: adding a provider means adding a variant here and an
/// adapter in `socialgate_auth`, and the compiler points at every match that
/// needs updating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Meta,
    Apple,
}

impl Provider {
    /// Every provider, in route registration order.
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Meta, Provider::Apple];

    /// Route segment and configuration key for this provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Meta => "meta",
            Self::Apple => "apple",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider: {0}")]
pub struct ParseProviderError(pub String);

impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            // Meta's login product still lives under the Facebook name.
            "meta" | "facebook" => Ok(Self::Meta),
            "apple" => Ok(Self::Apple),
            other => Err(ParseProviderError(other.to_string())),
        }
    }
}

/// Per-attempt login state, stored between `start` and `callback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFlowState {
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
    /// Relative path the caller asked to land on after login.
    pub return_to: Option<String>,
    /// PKCE verifier, for providers that take a code challenge.
    pub pkce_verifier: Option<String>,
}

impl AuthFlowState {
    pub fn new(provider: Provider, created_at: DateTime<Utc>) -> Self {
        Self {
            provider,
            created_at,
            return_to: None,
            pkce_verifier: None,
        }
    }
}

/// Token endpoint response of an authorization-code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Extra profile data delivered alongside the callback rather than by the
/// provider's API (Apple only sends the user's name once, in the form post).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileHints {
    pub display_name: Option<String>,
}

/// Provider-agnostic description of an authenticated end user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub provider: Provider,
    /// Provider's stable identifier for the user (`sub` / `id`).
    pub provider_user_id: String,
    pub display_name: Option<String>,
    pub emails: Vec<String>,
    /// Profile payload exactly as the provider returned it.
    pub raw_profile: serde_json::Value,
}
