//! Provider adapters.
//!
//! One adapter per supported provider, all behind the closed [`Adapter`]
//! enum so the router can hold them in a single map:
//! - Google (OpenID Connect userinfo)
//! - Meta (Graph API `/me`)
//! - Apple (ES256 client secret, `id_token` identity)

mod apple;
mod google;
mod meta;

use async_trait::async_trait;
use serde_json::Value;
use socialgate_core::auth::{
    Identity, ProfileHints, Provider, ProviderAdapter, Result, TokenSet,
};
use url::Url;

use crate::config::{ProviderConfig, ProviderEndpoints};
use crate::error::ConfigError;

pub use apple::{parse_user_name, AppleAdapter};
#[cfg(test)]
pub(crate) use apple::TEST_PRIVATE_KEY;
pub use google::GoogleAdapter;
pub use meta::MetaAdapter;

/// A configured provider adapter.
pub enum Adapter {
    Google(GoogleAdapter),
    Meta(MetaAdapter),
    Apple(AppleAdapter),
}

impl Adapter {
    /// Builds the adapter for `config`, validating it first.
    ///
    /// # Errors
    ///
    /// Missing credentials, unparseable endpoints and (for Apple) an invalid
    /// private key are all reported as `ConfigError`.
    pub fn from_config(
        config: &ProviderConfig,
        base_url: &Url,
        http: reqwest::Client,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(match config {
            ProviderConfig::Google(c) => Self::Google(GoogleAdapter::new(c, base_url, http)?),
            ProviderConfig::Meta(c) => Self::Meta(MetaAdapter::new(c, base_url, http)?),
            ProviderConfig::Apple(c) => Self::Apple(AppleAdapter::new(c, base_url, http)?),
        })
    }

    fn inner(&self) -> &dyn ProviderAdapter {
        match self {
            Self::Google(a) => a,
            Self::Meta(a) => a,
            Self::Apple(a) => a,
        }
    }
}

#[async_trait]
impl ProviderAdapter for Adapter {
    fn provider(&self) -> Provider {
        self.inner().provider()
    }

    fn uses_pkce(&self) -> bool {
        self.inner().uses_pkce()
    }

    fn authorization_url(&self, state: &str, pkce_challenge: Option<&str>) -> Result<Url> {
        self.inner().authorization_url(state, pkce_challenge)
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: Option<&str>) -> Result<TokenSet> {
        self.inner().exchange_code(code, pkce_verifier).await
    }

    async fn identity(&self, tokens: &TokenSet, hints: &ProfileHints) -> Result<Identity> {
        self.inner().identity(tokens, hints).await
    }
}

/// Caller overrides, or the provider's production endpoints.
fn endpoints_or(overrides: Option<&ProviderEndpoints>, defaults: ProviderEndpoints) -> ProviderEndpoints {
    overrides.cloned().unwrap_or(defaults)
}

/// Non-empty string member of a JSON object. Numeric ids are stringified.
fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppleConfig, GoogleConfig, MetaConfig};
    use std::time::Duration;

    fn base() -> Url {
        Url::parse("https://x/auth").unwrap()
    }

    fn http() -> reqwest::Client {
        crate::oauth::build_http_client(Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_from_config_dispatches_by_provider() {
        let google = Adapter::from_config(&GoogleConfig::new("id", "secret").into(), &base(), http()).unwrap();
        let meta = Adapter::from_config(&MetaConfig::new("id", "secret").into(), &base(), http()).unwrap();

        assert_eq!(google.provider(), Provider::Google);
        assert!(google.uses_pkce());
        assert_eq!(meta.provider(), Provider::Meta);
        assert!(!meta.uses_pkce());
    }

    #[test]
    fn test_from_config_validates_required_fields() {
        let config: ProviderConfig = AppleConfig::new("com.example.web", "TEAM", "KEY", "").into();
        let result = Adapter::from_config(&config, &base(), http());
        assert!(matches!(
            result,
            Err(ConfigError::MissingField {
                provider: Provider::Apple,
                field: "private_key"
            })
        ));
    }

    #[test]
    fn test_string_field() {
        let value = serde_json::json!({"id": 1234, "name": "Ada", "empty": "", "flag": true});
        assert_eq!(string_field(&value, "id").as_deref(), Some("1234"));
        assert_eq!(string_field(&value, "name").as_deref(), Some("Ada"));
        assert_eq!(string_field(&value, "empty"), None);
        assert_eq!(string_field(&value, "flag"), None);
        assert_eq!(string_field(&value, "missing"), None);
    }
}
