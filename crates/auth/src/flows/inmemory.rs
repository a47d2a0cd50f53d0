//! In-memory flow storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use socialgate_core::auth::{is_flow_expired, AuthError, AuthFlowState, FlowStore, Result};

/// In-memory flow store.
///
/// Stores flows and parked failures in HashMaps wrapped in `Arc<RwLock<_>>`.
/// Every consuming read takes the write lock, which makes `take_*` atomic
/// with respect to concurrent callbacks. Data is lost when the store is
/// dropped, so this only suits a single process.
#[derive(Debug, Clone)]
pub struct InMemoryFlowStore {
    flows: Arc<RwLock<HashMap<String, AuthFlowState>>>,
    failures: Arc<RwLock<HashMap<String, (DateTime<Utc>, AuthError)>>>,
    ttl: chrono::Duration,
}

impl InMemoryFlowStore {
    /// Creates an empty store whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            flows: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::weeks(52 * 100)),
        }
    }

    /// Number of stored flows, expired or not.
    pub async fn len(&self) -> usize {
        self.flows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn insert_flow(&self, state: &str, flow: &AuthFlowState) -> Result<()> {
        let mut flows = self.flows.write().await;
        flows.insert(state.to_string(), flow.clone());
        Ok(())
    }

    async fn take_flow(&self, state: &str) -> Result<Option<AuthFlowState>> {
        let mut flows = self.flows.write().await;
        let flow = flows.remove(state);
        Ok(flow.filter(|f| !is_flow_expired(f, Utc::now(), self.ttl)))
    }

    async fn insert_failure(&self, id: &str, error: &AuthError) -> Result<()> {
        let mut failures = self.failures.write().await;
        failures.insert(id.to_string(), (Utc::now(), error.clone()));
        Ok(())
    }

    async fn take_failure(&self, id: &str) -> Result<Option<AuthError>> {
        let mut failures = self.failures.write().await;
        let now = Utc::now();
        Ok(failures
            .remove(id)
            .filter(|(created_at, _)| *created_at + self.ttl > now)
            .map(|(_, error)| error))
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let now = Utc::now();

        let mut flows = self.flows.write().await;
        let before = flows.len();
        flows.retain(|_, f| !is_flow_expired(f, now, self.ttl));
        let mut removed = before - flows.len();
        drop(flows);

        let mut failures = self.failures.write().await;
        let before = failures.len();
        failures.retain(|_, (created_at, _)| *created_at + self.ttl > now);
        removed += before - failures.len();

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socialgate_core::auth::{generate_state, Provider};

    const TTL: Duration = Duration::from_secs(600);

    fn flow_aged(provider: Provider, age: chrono::Duration) -> AuthFlowState {
        AuthFlowState::new(provider, Utc::now() - age)
    }

    // ==================== Flow Tests ====================

    #[tokio::test]
    async fn test_flow_insert_and_take() {
        let store = InMemoryFlowStore::new(TTL);
        let mut flow = flow_aged(Provider::Google, chrono::Duration::zero());
        flow.pkce_verifier = Some("verifier".to_string());

        store.insert_flow("state-abc", &flow).await.unwrap();

        let taken = store.take_flow("state-abc").await.unwrap();
        assert_eq!(taken, Some(flow));

        // Single use
        let second = store.take_flow("state-abc").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_flow_take_unknown() {
        let store = InMemoryFlowStore::new(TTL);
        assert!(store.take_flow("never-issued").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_flow_is_absent_and_removed() {
        let store = InMemoryFlowStore::new(TTL);
        let stale = flow_aged(Provider::Meta, chrono::Duration::minutes(11));

        store.insert_flow("stale", &stale).await.unwrap();

        assert!(store.take_flow("stale").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_expiry_unaffected_by_concurrent_inserts() {
        let store = InMemoryFlowStore::new(TTL);
        let stale = flow_aged(Provider::Google, chrono::Duration::minutes(30));
        store.insert_flow("stale", &stale).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let flow = AuthFlowState::new(Provider::Google, Utc::now());
                store.insert_flow(&generate_state(), &flow).await.unwrap();
            }));
        }
        let take = {
            let store = store.clone();
            tokio::spawn(async move { store.take_flow("stale").await.unwrap() })
        };

        for handle in handles {
            handle.await.unwrap();
        }
        assert!(take.await.unwrap().is_none());
        assert_eq!(store.len().await, 32);
    }

    #[tokio::test]
    async fn test_racing_takes_yield_one_winner() {
        let store = InMemoryFlowStore::new(TTL);
        let flow = flow_aged(Provider::Apple, chrono::Duration::zero());
        store.insert_flow("contested", &flow).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.take_flow("contested").await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_flow_overwrite() {
        let store = InMemoryFlowStore::new(TTL);
        let first = flow_aged(Provider::Google, chrono::Duration::zero());
        let mut second = flow_aged(Provider::Apple, chrono::Duration::zero());
        second.return_to = Some("/settings".to_string());

        store.insert_flow("same-state", &first).await.unwrap();
        store.insert_flow("same-state", &second).await.unwrap();

        let taken = store.take_flow("same-state").await.unwrap().unwrap();
        assert_eq!(taken.provider, Provider::Apple);
        assert_eq!(taken.return_to.as_deref(), Some("/settings"));
    }

    // ==================== Failure Tests ====================

    #[tokio::test]
    async fn test_failure_insert_and_take() {
        let store = InMemoryFlowStore::new(TTL);
        let error = AuthError::TokenExchange("invalid_grant".to_string());

        store.insert_failure("f1", &error).await.unwrap();

        assert_eq!(store.take_failure("f1").await.unwrap(), Some(error));
        assert_eq!(store.take_failure("f1").await.unwrap(), None);
    }

    // ==================== Sweep Tests ====================

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = InMemoryFlowStore::new(TTL);
        store
            .insert_flow("old", &flow_aged(Provider::Google, chrono::Duration::hours(1)))
            .await
            .unwrap();
        store
            .insert_flow("new", &flow_aged(Provider::Google, chrono::Duration::zero()))
            .await
            .unwrap();

        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.take_flow("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let store = InMemoryFlowStore::new(TTL);
        let clone = store.clone();

        store
            .insert_flow("s", &flow_aged(Provider::Meta, chrono::Duration::zero()))
            .await
            .unwrap();

        assert!(clone.take_flow("s").await.unwrap().is_some());
    }
}
