//! Google, Meta and Apple sign-in as one mountable axum router.
//!
//! This crate provides:
//! - the authorization-code flow for each provider
//! - single-use, expiring login state (in memory, or Redis via feature flag)
//! - signed cookies binding each attempt to the browser that started it
//! - success and failure hooks that receive the outcome
//!
//! ```no_run
//! use socialgate_auth::{build, GoogleConfig, RouterConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RouterConfig::new("https://example.com/auth")
//!     .with_session_secret(std::env::var("OAUTH_SESSION_SECRET")?)
//!     .with_provider(GoogleConfig::new("client-id", "client-secret"))
//!     .on_success(|_parts, identity| async move { format!("hello {}", identity.provider_user_id) });
//!
//! let app = axum::Router::new().nest("/auth", build(config)?);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod flows;
mod handlers;
mod hooks;
mod oauth;
mod providers;
mod session;
mod state;

pub use config::{
    AppleConfig, GoogleConfig, MetaConfig, ProviderConfig, ProviderEndpoints, RouterConfig,
    DEFAULT_COOKIE_NAME, DEFAULT_FLOW_TTL, DEFAULT_HTTP_TIMEOUT,
};
pub use error::ConfigError;
#[cfg(feature = "redis")]
pub use flows::RedisFlowStore;
pub use flows::{spawn_sweeper, InMemoryFlowStore};
pub use handlers::{build, CallbackParams, StartQuery};
pub use hooks::{
    default_failure_response, default_success_response, FailureHook, ReturnTo, SuccessHook,
    FAILURE_MESSAGE,
};
pub use providers::{Adapter, AppleAdapter, GoogleAdapter, MetaAdapter};
pub use session::MIN_SECRET_LEN;
pub use socialgate_core::auth::{mount_path, AuthError, FlowStore, Identity, Provider};
pub use state::AuthState;

#[cfg(any(test, feature = "mock"))]
pub mod mock_idp;
