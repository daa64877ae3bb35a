//! # Test Doubles
//!
//! In-memory stand-ins for the router's external collaborators, so routing,
//! caching and event behavior can be exercised without a real key/value
//! service or audit sink.
//!
//! - [`MockStore`]: a [`KeyValueStore`] with TTLs and an availability switch
//!   for simulating an outage.
//! - [`RecordingListener`]: an [`InvokeListener`] that records what it sees,
//!   and can be told to fail.
//!
//! ```rust,ignore
//! let store = MockStore::new();
//! let router = Router::with_cache(config, Arc::new(RemoteCache::new(store.clone())));
//!
//! let recorder = Arc::new(RecordingListener::new());
//! router.add_listener(EventKind::All, recorder.clone());
//!
//! store.set_available(false);
//! let outcome = router.routing(Requester::new("/cached")).await;
//! assert!(matches!(outcome, Err(RouterError::Cache(_))));
//! assert_eq!(recorder.count(EventKind::Complete), 1);
//! ```

use crate::cache::{KeyValueStore, StoreError};
use crate::error::RouterError;
use crate::event::{EventKind, InvokeEvent, InvokeListener};
use crate::pattern;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// KEY/VALUE STORE
// =============================================================================

#[derive(Debug)]
struct Stored {
    value: String,
    expires_at: Option<Instant>,
}

/// In-memory [`KeyValueStore`]. Clones share the same data.
#[derive(Debug, Clone)]
pub struct MockStore {
    data: Arc<Mutex<HashMap<String, Stored>>>,
    available: Arc<AtomicBool>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// While unavailable every operation fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .lock()
            .values()
            .filter(|s| s.expires_at.map_or(true, |at| at > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError("connection refused".into()))
        }
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        let now = Instant::now();
        let mut data = self.data.lock();
        let expired = match data.get(key) {
            Some(stored) => stored.expires_at.is_some_and(|at| at <= now),
            None => return Ok(None),
        };
        if expired {
            data.remove(key);
            return Ok(None);
        }
        Ok(data.get(key).map(|stored| stored.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.check()?;
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.data
            .lock()
            .insert(key.to_string(), Stored { value, expires_at });
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        if let Some(stored) = self.data.lock().get_mut(key) {
            stored.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        self.check()?;
        let mut data = self.data.lock();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, glob: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self
            .data
            .lock()
            .keys()
            .filter(|key| pattern::matches(glob, key))
            .cloned()
            .collect())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.check()?;
        self.data.lock().clear();
        Ok(())
    }
}

// =============================================================================
// LISTENER
// =============================================================================

/// Listener that records every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<InvokeEvent>>,
    name: Option<(&'static str, Arc<Mutex<Vec<&'static str>>>)>,
    fail_with: Option<RouterError>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also appends `name` to the shared `order` log on every event.
    pub fn named(name: &'static str, order: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            name: Some((name, order)),
            ..Self::default()
        }
    }

    /// Records the event, then fails with `error`.
    pub fn failing(error: RouterError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<InvokeEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| kind == EventKind::All || e.kind() == kind)
            .count()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(InvokeEvent::kind).collect()
    }
}

#[async_trait]
impl InvokeListener for RecordingListener {
    async fn on_event(&self, event: &InvokeEvent) -> Result<(), RouterError> {
        self.events.lock().push(event.clone());
        if let Some((name, order)) = &self.name {
            order.lock().push(*name);
        }
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
