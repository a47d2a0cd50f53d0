use async_trait::async_trait;
use url::Url;

use super::{AuthError, AuthFlowState, Identity, ProfileHints, Provider, TokenSet};

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// One identity provider's half of the authorization-code grant.
///
/// The HTTP layer owns state generation and validation; an adapter only knows
/// how to talk to its provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter represents.
    fn provider(&self) -> Provider;

    /// Whether the provider takes a PKCE code challenge.
    fn uses_pkce(&self) -> bool;

    /// Authorization endpoint URL the browser is redirected to.
    fn authorization_url(&self, state: &str, pkce_challenge: Option<&str>) -> Result<Url>;

    /// Exchange the callback's authorization code for tokens.
    async fn exchange_code(&self, code: &str, pkce_verifier: Option<&str>) -> Result<TokenSet>;

    /// Resolve the tokens into a normalized identity.
    async fn identity(&self, tokens: &TokenSet, hints: &ProfileHints) -> Result<Identity>;
}

/// Storage for in-flight login attempts.
///
/// Entries are single use: `take_flow` removes the entry atomically, so two
/// racing callbacks carrying the same state cannot both succeed. Expired
/// entries are reported as absent.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Store the flow under its state token.
    async fn insert_flow(&self, state: &str, flow: &AuthFlowState) -> Result<()>;

    /// Remove and return the flow if it exists and has not expired.
    async fn take_flow(&self, state: &str) -> Result<Option<AuthFlowState>>;

    /// Park an error for the failure endpoint under a one-off id.
    async fn insert_failure(&self, id: &str, error: &AuthError) -> Result<()>;

    /// Remove and return a parked error.
    async fn take_failure(&self, id: &str) -> Result<Option<AuthError>>;

    /// Drop expired entries, returning how many were removed.
    async fn sweep_expired(&self) -> Result<usize>;
}
