use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::request::Parts, response::IntoResponse};
use socialgate_core::auth::{
    enabled_providers, AuthError, FlowStore, Identity, ParseProviderError, Provider,
};

use crate::error::ConfigError;
use crate::hooks::{failure_hook, success_hook, Hooks};

/// Default lifetime of an unfinished login attempt.
pub const DEFAULT_FLOW_TTL: Duration = Duration::from_secs(10 * 60);

/// Default bound on each token-exchange and profile request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_COOKIE_NAME: &str = "socialgate_flow";

/// Provider endpoint overrides.
///
/// Every provider ships with its production endpoints; overriding them is
/// meant for tests and local identity-provider stand-ins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorization: String,
    pub token: String,
    /// Profile endpoint (Google, Meta). Apple has none.
    pub userinfo: Option<String>,
    /// Expected `iss` of ID tokens (Apple).
    pub issuer: Option<String>,
}

/// Google OAuth client credentials.
#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Requested scopes. Empty means `["email"]`.
    pub scopes: Vec<String>,
    pub endpoints: Option<ProviderEndpoints>,
}

/// Meta (Facebook Login) app credentials.
#[derive(Clone)]
pub struct MetaConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub endpoints: Option<ProviderEndpoints>,
}

/// Sign in with Apple credentials.
///
/// Apple has no static client secret; a short-lived ES256 JWT is minted from
/// the team's private key for every token request.
#[derive(Clone)]
pub struct AppleConfig {
    /// Services ID.
    pub client_id: String,
    pub team_id: String,
    pub key_id: String,
    /// PEM-encoded ES256 (P-256) private key.
    pub private_key: String,
    pub scopes: Vec<String>,
    pub endpoints: Option<ProviderEndpoints>,
}

impl GoogleConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: Vec::new(),
            endpoints: None,
        }
    }

    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }
}

impl MetaConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: Vec::new(),
            endpoints: None,
        }
    }

    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }
}

impl AppleConfig {
    pub fn new(
        client_id: impl Into<String>,
        team_id: impl Into<String>,
        key_id: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            team_id: team_id.into(),
            key_id: key_id.into(),
            private_key: private_key.into(),
            scopes: Vec::new(),
            endpoints: None,
        }
    }

    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }
}

/// Configuration for one provider.
#[derive(Clone)]
pub enum ProviderConfig {
    Google(GoogleConfig),
    Meta(MetaConfig),
    Apple(AppleConfig),
}

impl ProviderConfig {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Google(_) => Provider::Google,
            Self::Meta(_) => Provider::Meta,
            Self::Apple(_) => Provider::Apple,
        }
    }

    /// Points the provider at different endpoints.
    pub fn with_endpoints(self, endpoints: ProviderEndpoints) -> Self {
        match self {
            Self::Google(c) => Self::Google(c.with_endpoints(endpoints)),
            Self::Meta(c) => Self::Meta(c.with_endpoints(endpoints)),
            Self::Apple(c) => Self::Apple(c.with_endpoints(endpoints)),
        }
    }

    /// Checks that every required field is non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = self.provider();
        match self {
            Self::Google(c) => {
                require(provider, "client_id", &c.client_id)?;
                require(provider, "client_secret", &c.client_secret)
            }
            Self::Meta(c) => {
                require(provider, "client_id", &c.client_id)?;
                require(provider, "client_secret", &c.client_secret)
            }
            Self::Apple(c) => {
                require(provider, "client_id", &c.client_id)?;
                require(provider, "team_id", &c.team_id)?;
                require(provider, "key_id", &c.key_id)?;
                require(provider, "private_key", &c.private_key)
            }
        }
    }
}

fn require(provider: Provider, field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField { provider, field });
    }
    Ok(())
}

impl From<GoogleConfig> for ProviderConfig {
    fn from(config: GoogleConfig) -> Self {
        Self::Google(config)
    }
}

impl From<MetaConfig> for ProviderConfig {
    fn from(config: MetaConfig) -> Self {
        Self::Meta(config)
    }
}

impl From<AppleConfig> for ProviderConfig {
    fn from(config: AppleConfig) -> Self {
        Self::Apple(config)
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials are left out so configs can be logged.
        match self {
            Self::Google(c) => f
                .debug_struct("GoogleConfig")
                .field("client_id", &c.client_id)
                .field("scopes", &c.scopes)
                .field("endpoints", &c.endpoints)
                .finish_non_exhaustive(),
            Self::Meta(c) => f
                .debug_struct("MetaConfig")
                .field("client_id", &c.client_id)
                .field("scopes", &c.scopes)
                .field("endpoints", &c.endpoints)
                .finish_non_exhaustive(),
            Self::Apple(c) => f
                .debug_struct("AppleConfig")
                .field("client_id", &c.client_id)
                .field("team_id", &c.team_id)
                .field("key_id", &c.key_id)
                .field("scopes", &c.scopes)
                .field("endpoints", &c.endpoints)
                .finish_non_exhaustive(),
        }
    }
}

/// Complete router configuration.
///
/// ```
/// use socialgate_auth::{GoogleConfig, RouterConfig};
///
/// let config = RouterConfig::new("https://example.com/auth")
///     .with_session_secret("0123456789abcdef0123456789abcdef")
///     .with_provider(GoogleConfig::new("client-id", "client-secret"))
///     .on_success(|_parts, identity| async move { axum::Json(identity) });
///
/// assert_eq!(config.enabled_providers(), vec![socialgate_auth::Provider::Google]);
/// ```
#[derive(Clone)]
pub struct RouterConfig {
    /// Absolute URL the router is mounted at, e.g. `https://example.com/auth`.
    pub base_url: String,
    pub providers: BTreeMap<Provider, ProviderConfig>,
    /// Providers to enable. Empty enables every configured provider.
    pub filter: Vec<Provider>,
    /// Key material for signing login cookies. Required.
    pub session_secret: Option<String>,
    pub flow_ttl: Duration,
    pub http_timeout: Duration,
    pub cookie_name: String,
    /// Period of the background sweep of expired flows and parked failures.
    /// `None` sweeps every `flow_ttl`.
    pub sweep_interval: Option<Duration>,
    pub(crate) flow_store: Option<Arc<dyn FlowStore>>,
    pub(crate) hooks: Hooks,
}

impl RouterConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            providers: BTreeMap::new(),
            filter: Vec::new(),
            session_secret: None,
            flow_ttl: DEFAULT_FLOW_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            sweep_interval: None,
            flow_store: None,
            hooks: Hooks::default(),
        }
    }

    /// Adds (or replaces) a provider's configuration.
    pub fn with_provider(mut self, config: impl Into<ProviderConfig>) -> Self {
        let config = config.into();
        self.providers.insert(config.provider(), config);
        self
    }

    pub fn with_filter(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.filter = providers.into_iter().collect();
        self
    }

    pub fn with_session_secret(mut self, secret: impl Into<String>) -> Self {
        self.session_secret = Some(secret.into());
        self
    }

    pub fn with_flow_ttl(mut self, ttl: Duration) -> Self {
        self.flow_ttl = ttl;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Base name of the login cookies.
    ///
    /// Each provider gets its own flow cookie, `{name}_{provider}`, so logins
    /// with different providers can run side by side. Two concurrent logins
    /// with the same provider in one browser still share a cookie, and only
    /// the later one can complete.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Replaces the default in-memory flow store, e.g. with a shared Redis
    /// store when running several instances.
    pub fn with_flow_store(mut self, store: Arc<dyn FlowStore>) -> Self {
        self.flow_store = Some(store);
        self
    }

    /// Called with the normalized identity after a successful login.
    /// Without it, the identity is returned as JSON.
    pub fn on_success<F, Fut, R>(mut self, hook: F) -> Self
    where
        F: Fn(Parts, Identity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.hooks.on_success = Some(success_hook(hook));
        self
    }

    /// Called by the failure endpoint. Without it, a generic 401 is returned.
    pub fn on_failure<F, Fut, R>(mut self, hook: F) -> Self
    where
        F: Fn(Parts, AuthError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.hooks.on_failure = Some(failure_hook(hook));
        self
    }

    /// Providers that will get routes.
    pub fn enabled_providers(&self) -> Vec<Provider> {
        let configured: Vec<Provider> = self.providers.keys().copied().collect();
        enabled_providers(&configured, &self.filter)
    }

    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OAUTH_BASE_URL`: Absolute mount URL (required)
    /// - `OAUTH_SESSION_SECRET`: Cookie signing secret (required by `build`)
    /// - `OAUTH_PROVIDERS`: Comma-separated filter (default: all configured)
    /// - `OAUTH_FLOW_TTL_SECS`: Login attempt lifetime (default: 600)
    /// - `OAUTH_HTTP_TIMEOUT_SECS`: Provider request timeout (default: 10)
    /// - `OAUTH_SWEEP_INTERVAL_SECS`: Expired flow sweep period (default: the flow TTL)
    /// - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` / `GOOGLE_SCOPES`
    /// - `META_CLIENT_ID` / `META_CLIENT_SECRET` / `META_SCOPES`
    /// - `APPLE_CLIENT_ID` / `APPLE_TEAM_ID` / `APPLE_KEY_ID` / `APPLE_PRIVATE_KEY` / `APPLE_SCOPES`
    ///
    /// A provider is configured when its client id is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider is partially configured (e.g., client ID
    /// without secret) or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::MissingEnv(name));
        let scopes = |name: &'static str| -> Vec<String> {
            var(name)
                .map(|v| {
                    v.split(|c: char| c == ',' || c.is_whitespace())
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default()
        };
        let seconds = |name: &'static str| -> Result<Option<Duration>, ConfigError> {
            var(name)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map(Duration::from_secs)
                        .map_err(|_| ConfigError::InvalidEnv { name, value: v })
                })
                .transpose()
        };

        let mut config = Self::new(required("OAUTH_BASE_URL")?);

        if let Some(secret) = var("OAUTH_SESSION_SECRET") {
            config = config.with_session_secret(secret);
        }

        if let Some(client_id) = var("GOOGLE_CLIENT_ID") {
            config = config.with_provider(
                GoogleConfig::new(client_id, required("GOOGLE_CLIENT_SECRET")?)
                    .with_scopes(scopes("GOOGLE_SCOPES")),
            );
        }

        if let Some(client_id) = var("META_CLIENT_ID") {
            config = config.with_provider(
                MetaConfig::new(client_id, required("META_CLIENT_SECRET")?)
                    .with_scopes(scopes("META_SCOPES")),
            );
        }

        if let Some(client_id) = var("APPLE_CLIENT_ID") {
            // Keys pasted into a single-line env var usually carry literal `\n`s.
            let private_key = required("APPLE_PRIVATE_KEY")?.replace("\\n", "\n");
            config = config.with_provider(
                AppleConfig::new(
                    client_id,
                    required("APPLE_TEAM_ID")?,
                    required("APPLE_KEY_ID")?,
                    private_key,
                )
                .with_scopes(scopes("APPLE_SCOPES")),
            );
        }

        if let Some(list) = var("OAUTH_PROVIDERS") {
            let filter = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<Provider>, ParseProviderError>>()?;
            config = config.with_filter(filter);
        }

        if let Some(ttl) = seconds("OAUTH_FLOW_TTL_SECS")? {
            config = config.with_flow_ttl(ttl);
        }
        if let Some(timeout) = seconds("OAUTH_HTTP_TIMEOUT_SECS")? {
            config = config.with_http_timeout(timeout);
        }
        if let Some(interval) = seconds("OAUTH_SWEEP_INTERVAL_SECS")? {
            config = config.with_sweep_interval(interval);
        }

        Ok(config)
    }
}

impl std::fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterConfig")
            .field("base_url", &self.base_url)
            .field("providers", &self.providers)
            .field("filter", &self.filter)
            .field("flow_ttl", &self.flow_ttl)
            .field("http_timeout", &self.http_timeout)
            .field("cookie_name", &self.cookie_name)
            .field("sweep_interval", &self.sweep_interval)
            .finish_non_exhaustive()
    }
}
