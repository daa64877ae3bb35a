//! In-process cache backend.

use super::{CacheEngine, CacheError, CacheValue};
use crate::pattern;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tracing::{debug, info};

/// Default interval between two sweeps of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct Entry {
    content: Value,
    timeout: Duration,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Entries = Arc<Mutex<HashMap<String, Entry>>>;

/// A mutex-guarded map with sliding expiration.
///
/// Expired entries are dropped lazily when read, and in bulk by the sweeper
/// started with [`MemoryCache::with_sweeper`]. The sweeper holds the map lock
/// for the whole pass.
#[derive(Default)]
pub struct MemoryCache {
    entries: Entries,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryCache {
    /// A cache without a background sweeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache swept every `interval`. Must be called inside a Tokio runtime.
    pub fn with_sweeper(interval: Duration) -> Self {
        let cache = Self::new();
        let entries = Arc::downgrade(&cache.entries);
        let ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        *cache.sweeper.lock() = Some(tokio::spawn(sweep_loop(entries, ticker)));
        info!(interval_secs = interval.as_secs(), "Cache sweeper started");
        cache
    }

    /// Removes every expired entry now and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        sweep_entries(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
            info!("Cache sweeper stopped");
        }
    }
}

impl Drop for MemoryCache {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

async fn sweep_loop(entries: Weak<Mutex<HashMap<String, Entry>>>, mut ticker: Interval) {
    loop {
        ticker.tick().await;
        let Some(entries) = entries.upgrade() else {
            break;
        };
        let removed = sweep_entries(&entries);
        debug!(removed, "Cache sweep");
    }
}

fn sweep_entries(entries: &Mutex<HashMap<String, Entry>>) -> usize {
    let now = Instant::now();
    let mut entries = entries.lock();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}

#[async_trait]
impl CacheEngine for MemoryCache {
    async fn get(&self, key: &str) -> Result<CacheValue, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return Ok(CacheValue::miss());
        };
        if entry.is_expired(now) {
            entries.remove(key);
            return Ok(CacheValue::miss());
        }
        if !entry.timeout.is_zero() {
            entry.expires_at = Some(now + entry.timeout);
        }
        Ok(CacheValue::hit(entry.content.clone()))
    }

    async fn set(&self, key: &str, value: Value, timeout: Duration) -> Result<(), CacheError> {
        let expires_at = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                content: value,
                timeout,
                expires_at,
            },
        );
        Ok(())
    }

    async fn remove(&self, key_or_pattern: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        if pattern::is_pattern(key_or_pattern) {
            entries.retain(|key, _| !pattern::matches(key_or_pattern, key));
        } else {
            entries.remove(key_or_pattern);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.lock().clear();
        Ok(())
    }

    async fn destroy(&self) -> Result<(), CacheError> {
        self.stop_sweeper();
        self.entries.lock().clear();
        Ok(())
    }
}
