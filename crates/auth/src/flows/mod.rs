//! Login flow storage.
//!
//! Provides `FlowStore` implementations for:
//! - In-memory (default, single process)
//! - Redis (with `redis` feature, shared between instances)

mod inmemory;
#[cfg(feature = "redis")]
mod redis_impl;

use std::sync::Arc;
use std::time::Duration;

use socialgate_core::auth::FlowStore;
use tokio::task::JoinHandle;

pub use inmemory::InMemoryFlowStore;
#[cfg(feature = "redis")]
pub use redis_impl::RedisFlowStore;

/// Periodically drops expired entries from `store`.
///
/// Lazy expiry on `take_flow` only removes the entries that are looked up.
/// Abandoned logins and unread failures are left to this sweep. The task
/// holds a weak reference and ends once every router using `store` is gone.
pub fn spawn_sweeper(store: Arc<dyn FlowStore>, interval: Duration) -> JoinHandle<()> {
    let store = Arc::downgrade(&store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                tracing::debug!("flow store dropped, stopping sweeper");
                break;
            };
            match store.sweep_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "swept expired login flows"),
                Err(e) => tracing::error!(error = %e, "failed to sweep login flows"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use socialgate_core::auth::{AuthError, AuthFlowState, Provider};

    #[tokio::test]
    async fn test_sweeper_removes_abandoned_entries() {
        let store = Arc::new(InMemoryFlowStore::new(Duration::from_millis(100)));
        for i in 0..20 {
            let flow = AuthFlowState::new(Provider::Google, Utc::now());
            store.insert_flow(&format!("abandoned-{i}"), &flow).await.unwrap();
        }
        store
            .insert_failure("unread", &AuthError::StateMismatch)
            .await
            .unwrap();

        let _handle = spawn_sweeper(store.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(store.is_empty().await);
        // Nothing left for a manual sweep, so the failure went too.
        assert_eq!(store.sweep_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_store_is_dropped() {
        let store: Arc<dyn FlowStore> = Arc::new(InMemoryFlowStore::new(Duration::from_secs(60)));
        let handle = spawn_sweeper(store.clone(), Duration::from_millis(10));
        drop(store);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
