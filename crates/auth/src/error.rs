use socialgate_core::auth::{ParseProviderError, Provider};
use thiserror::Error;

/// Setup errors raised while building the router.
///
/// These are fatal: `build` returns before registering any route, so a
/// misconfigured provider never ends up half-mounted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("base URL must be an absolute http(s) URL without query or fragment: {0:?}")]
    InvalidBaseUrl(String),

    #[error("{provider} configuration is missing required field `{field}`")]
    MissingField {
        provider: Provider,
        field: &'static str,
    },

    #[error("invalid {provider} endpoint URL: {url:?}")]
    InvalidEndpoint { provider: Provider, url: String },

    #[error("invalid Apple private key: {0}")]
    InvalidPrivateKey(String),

    #[error("a session secret is required to sign login cookies")]
    MissingSessionSecret,

    #[error("session secret must be at least {0} bytes long")]
    WeakSessionSecret(usize),

    #[error(transparent)]
    UnknownProvider(#[from] ParseProviderError),

    #[error("environment variable {0} is required")]
    MissingEnv(&'static str),

    #[error("environment variable {name} has an invalid value: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
