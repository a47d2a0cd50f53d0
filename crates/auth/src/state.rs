//! Shared state for the login routes.

use std::collections::BTreeMap;
use std::sync::Arc;

use socialgate_core::auth::{failure_path, parse_base_url, FlowStore, Provider};

use crate::config::RouterConfig;
use crate::error::ConfigError;
use crate::flows::InMemoryFlowStore;
use crate::hooks::Hooks;
use crate::oauth::build_http_client;
use crate::providers::Adapter;
use crate::session::SessionSettings;

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AuthState {
    adapters: Arc<BTreeMap<Provider, Adapter>>,
    pub(crate) flows: Arc<dyn FlowStore>,
    pub(crate) session: SessionSettings,
    pub(crate) hooks: Hooks,
    pub(crate) failure_path: String,
}

impl AuthState {
    /// Validates `config` and builds an adapter for every enabled provider.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found. Providers that are
    /// configured but filtered out are not validated.
    pub(crate) fn from_config(config: RouterConfig) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&config.base_url)
            .ok_or_else(|| ConfigError::InvalidBaseUrl(config.base_url.clone()))?;

        let session = SessionSettings::new(
            config.session_secret.as_deref(),
            &config.cookie_name,
            &base_url,
            config.flow_ttl,
        )?;

        let http = build_http_client(config.http_timeout)?;

        let mut adapters = BTreeMap::new();
        for provider in config.enabled_providers() {
            if let Some(provider_config) = config.providers.get(&provider) {
                let adapter = Adapter::from_config(provider_config, &base_url, http.clone())?;
                adapters.insert(provider, adapter);
            }
        }

        let flows: Arc<dyn FlowStore> = match config.flow_store {
            Some(store) => store,
            None => Arc::new(InMemoryFlowStore::new(config.flow_ttl)),
        };

        Ok(Self {
            adapters: Arc::new(adapters),
            flows,
            session,
            hooks: config.hooks,
            failure_path: failure_path(&base_url),
        })
    }

    pub fn adapter(&self, provider: Provider) -> Option<&Adapter> {
        self.adapters.get(&provider)
    }

    /// Enabled providers, in a stable order.
    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.keys().copied().collect()
    }
}
