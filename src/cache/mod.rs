//! # Cache Engine
//!
//! The router stores computed results through the [`CacheEngine`] trait. Two
//! backends implement it:
//!
//! - [`MemoryCache`]: an in-process map with a background sweeper.
//! - [`RemoteCache`]: delegates to an external key/value service through the
//!   narrow [`KeyValueStore`] trait.
//!
//! Both treat a positive timeout as *sliding*: a hit pushes the expiration
//! forward by the entry's timeout. A timeout of zero never expires.
//!
//! Keys follow the wire format built by [`cache_key`], and `remove` accepts a
//! glob so a whole resource namespace (`{/report}*`) can be dropped at once.

mod key;
mod memory;
mod remote;

pub use key::*;
pub use memory::*;
pub use remote::*;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Errors surfaced by cache backends.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CacheError {
    /// The backing service could not serve this operation.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Result of a cache read. `cached == false` is a miss, which is distinct from
/// a hit whose content is `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheValue {
    pub cached: bool,
    pub content: Value,
}

impl CacheValue {
    pub fn miss() -> Self {
        Self {
            cached: false,
            content: Value::Null,
        }
    }

    pub fn hit(content: Value) -> Self {
        Self {
            cached: true,
            content,
        }
    }

    pub fn into_content(self) -> Option<Value> {
        self.cached.then_some(self.content)
    }
}

/// Storage contract used by the router.
#[async_trait]
pub trait CacheEngine: Send + Sync {
    async fn get(&self, key: &str) -> Result<CacheValue, CacheError>;

    /// Stores `value`; `timeout` of zero means the entry never expires.
    async fn set(&self, key: &str, value: Value, timeout: Duration) -> Result<(), CacheError>;

    /// Removes `key`, or every key matching it when it contains wildcards.
    async fn remove(&self, key_or_pattern: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    /// Releases background resources held by the engine.
    async fn destroy(&self) -> Result<(), CacheError>;
}
