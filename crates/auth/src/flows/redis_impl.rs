//! Redis flow storage.

use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use socialgate_core::auth::{AuthError, AuthFlowState, FlowStore, Result};

fn storage(e: impl std::fmt::Display) -> AuthError {
    AuthError::Storage(e.to_string())
}

/// Redis-backed flow store, for deployments with more than one instance.
///
/// Entries are written with `SET .. EX` so Redis expires them on its own,
/// and consumed with `GETDEL` so only one callback can ever claim a state.
pub struct RedisFlowStore {
    pool: Pool,
    ttl: Duration,
    prefix: String,
}

impl RedisFlowStore {
    /// Creates a store on an already connected pool.
    ///
    /// # Arguments
    ///
    /// * `pool` - Redis connection pool
    /// * `ttl` - lifetime of flows and parked failures
    pub fn new(pool: Pool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl,
            prefix: "socialgate".to_string(),
        }
    }

    /// Namespaces keys under `prefix` instead of `socialgate`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn flow_key(&self, state: &str) -> String {
        format!("{}:flow:{}", self.prefix, state)
    }

    fn failure_key(&self, id: &str) -> String {
        format!("{}:failure:{}", self.prefix, id)
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let ttl_secs = self.ttl.as_secs().max(1) as i64;
        self.pool
            .set::<(), _, _>(key, value, Some(Expiration::EX(ttl_secs)), None, false)
            .await
            .map_err(storage)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        self.pool.getdel(key).await.map_err(storage)
    }
}

#[async_trait]
impl FlowStore for RedisFlowStore {
    async fn insert_flow(&self, state: &str, flow: &AuthFlowState) -> Result<()> {
        let value = serde_json::to_string(flow).map_err(storage)?;
        self.put(&self.flow_key(state), value).await
    }

    async fn take_flow(&self, state: &str) -> Result<Option<AuthFlowState>> {
        match self.take(&self.flow_key(state)).await? {
            Some(json) => serde_json::from_str(&json).map(Some).map_err(storage),
            None => Ok(None),
        }
    }

    async fn insert_failure(&self, id: &str, error: &AuthError) -> Result<()> {
        let value = serde_json::to_string(error).map_err(storage)?;
        self.put(&self.failure_key(id), value).await
    }

    async fn take_failure(&self, id: &str) -> Result<Option<AuthError>> {
        match self.take(&self.failure_key(id)).await? {
            Some(json) => serde_json::from_str(&json).map(Some).map_err(storage),
            None => Ok(None),
        }
    }

    async fn sweep_expired(&self) -> Result<usize> {
        // Redis expires keys itself.
        Ok(0)
    }
}
