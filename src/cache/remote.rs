//! Cache backend delegating to an external key/value service.

use super::{CacheEngine, CacheError, CacheValue};
use crate::pattern;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Failure reported by a [`KeyValueStore`].
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{0}")]
pub struct StoreError(pub String);

/// The narrow slice of a key/value service the remote cache needs.
///
/// Implementations wrap a client for the actual service. `keys` takes a glob
/// in the same syntax as [`crate::pattern`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value`, expiring after `ttl` when one is given.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError>;

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    async fn flush(&self) -> Result<(), StoreError>;
}

/// What is written to the store for each entry.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    content: Value,
    /// Seconds; zero never expires.
    timeout: u64,
}

/// [`CacheEngine`] over a [`KeyValueStore`].
///
/// Every store failure is surfaced as [`CacheError::Unavailable`]; nothing is
/// served from a local copy when the service is down.
pub struct RemoteCache<S> {
    store: S,
}

impl<S: KeyValueStore> RemoteCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

fn unavailable(op: &'static str) -> impl Fn(StoreError) -> CacheError {
    move |e| {
        warn!(op, error = %e, "Cache store failed");
        CacheError::Unavailable(format!("{op}: {e}"))
    }
}

#[async_trait]
impl<S: KeyValueStore> CacheEngine for RemoteCache<S> {
    async fn get(&self, key: &str) -> Result<CacheValue, CacheError> {
        let Some(raw) = self.store.get(key).await.map_err(unavailable("get"))? else {
            return Ok(CacheValue::miss());
        };
        let envelope: Envelope =
            serde_json::from_str(&raw).map_err(|e| CacheError::Serialization(e.to_string()))?;
        if envelope.timeout > 0 {
            self.store
                .expire(key, Duration::from_secs(envelope.timeout))
                .await
                .map_err(unavailable("expire"))?;
        }
        Ok(CacheValue::hit(envelope.content))
    }

    async fn set(&self, key: &str, value: Value, timeout: Duration) -> Result<(), CacheError> {
        let envelope = Envelope {
            content: value,
            timeout: timeout.as_secs(),
        };
        let raw = serde_json::to_string(&envelope).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let ttl = (!timeout.is_zero()).then_some(timeout);
        self.store.set(key, raw, ttl).await.map_err(unavailable("set"))
    }

    async fn remove(&self, key_or_pattern: &str) -> Result<(), CacheError> {
        let keys = if pattern::is_pattern(key_or_pattern) {
            self.store.keys(key_or_pattern).await.map_err(unavailable("keys"))?
        } else {
            vec![key_or_pattern.to_string()]
        };
        if keys.is_empty() {
            return Ok(());
        }
        debug!(pattern = key_or_pattern, removed = keys.len(), "Remote cache remove");
        self.store.delete(&keys).await.map_err(unavailable("delete"))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.store.flush().await.map_err(unavailable("flush"))
    }

    async fn destroy(&self) -> Result<(), CacheError> {
        // The store's connection is owned by the caller; shared data stays.
        Ok(())
    }
}
