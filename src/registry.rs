//! # Resource Registry
//!
//! Maps resource addresses to their [`Function`] descriptors. Registration keys
//! may be wildcard patterns (see [`crate::pattern`]); a concrete address that
//! only matches a pattern is resolved by scanning once and then memoized, so
//! every later lookup of the same address is a single map hit.
//!
//! The memo grows with the set of distinct concrete addresses clients actually
//! call. Any new registration clears it, since a newly covered address may
//! change what a pattern lookup should return. Registrations also bump a
//! generation counter, and a scan that overlapped one drops its own memo
//! entry again, so a result computed before the registration never outlives
//! it.

use crate::error::RouterError;
use crate::invoker::Function;
use crate::keyed_lock::KeyedLocks;
use crate::pattern;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct Registry {
    functions: RwLock<HashMap<String, Arc<Function>>>,
    resolved: DashMap<String, Arc<Function>>,
    snapshot: RwLock<Option<Arc<[String]>>>,
    generation: AtomicU64,
    locks: KeyedLocks,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function` under `address`.
    ///
    /// Fails with [`RouterError::DuplicateRegistration`] when the address is
    /// taken and `cover` is false.
    pub fn register(
        &self,
        address: impl Into<String>,
        function: Function,
        cover: bool,
    ) -> Result<(), RouterError> {
        let address = address.into();
        {
            let mut functions = self.functions.write();
            if !cover && functions.contains_key(&address) {
                return Err(RouterError::DuplicateRegistration(address));
            }
            debug!(%address, cover, "Registered");
            functions.insert(address, Arc::new(function));
        }
        *self.snapshot.write() = None;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.resolved.clear();
        Ok(())
    }

    /// Exact-match lookup; patterns are not expanded.
    pub fn is_registered(&self, address: &str) -> bool {
        self.functions.read().contains_key(address)
    }

    /// Sorted snapshot of every registration key.
    pub fn addresses(&self) -> Arc<[String]> {
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            return Arc::clone(snapshot);
        }

        let mut snapshot = self.snapshot.write();
        if let Some(existing) = snapshot.as_ref() {
            return Arc::clone(existing);
        }
        let mut addresses: Vec<String> = self.functions.read().keys().cloned().collect();
        addresses.sort();
        let addresses: Arc<[String]> = addresses.into();
        *snapshot = Some(Arc::clone(&addresses));
        addresses
    }

    /// Resolves `address` to its descriptor, falling back to pattern keys.
    pub fn resolve(&self, address: &str) -> Result<Arc<Function>, RouterError> {
        if let Some(function) = self.functions.read().get(address) {
            return Ok(Arc::clone(function));
        }
        if let Some(function) = self.resolved.get(address) {
            return Ok(Arc::clone(function.value()));
        }

        self.locks.with_lock(address, || {
            if let Some(function) = self.resolved.get(address) {
                return Ok(Arc::clone(function.value()));
            }

            let generation = self.generation.load(Ordering::SeqCst);
            let addresses = self.addresses();
            let functions = self.functions.read();
            let found = addresses
                .iter()
                .filter(|key| pattern::is_pattern(key))
                .find(|key| pattern::matches(key, address))
                .and_then(|key| functions.get(key.as_str()).map(|f| (key, Arc::clone(f))));

            match found {
                Some((key, function)) => {
                    debug!(address, pattern = %key, "Resolved by pattern");
                    self.memoize(address, &function, generation);
                    Ok(function)
                }
                None => Err(RouterError::AccessDenied(address.to_string())),
            }
        })
    }

    /// Stores a scan result taken at `generation`, unless a registration has
    /// happened since.
    fn memoize(&self, address: &str, function: &Arc<Function>, generation: u64) {
        self.resolved.insert(address.to_string(), Arc::clone(function));
        // Either this sees the bump, or the registration's clear runs after our insert.
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(address, "Registry changed during scan; memo dropped");
            self.resolved.remove(address);
        }
    }

    /// Number of concrete addresses resolved through patterns so far.
    pub fn memoized(&self) -> usize {
        self.resolved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::handler_fn;
    use serde_json::Value;

    fn constant(value: &'static str) -> Function {
        Function::local(handler_fn(move |_| async move { Ok(Value::from(value)) }), vec![])
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = Registry::new();
        registry.register("/a", constant("one"), false).unwrap();

        let err = registry.register("/a", constant("two"), false).unwrap_err();
        assert_eq!(err, RouterError::DuplicateRegistration("/a".into()));
    }

    #[test]
    fn test_cover_replaces_handler() {
        let registry = Registry::new();
        registry.register("/a", constant("one"), false).unwrap();
        let first = registry.resolve("/a").unwrap();

        registry.register("/a", constant("two"), true).unwrap();
        let second = registry.resolve("/a").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_addresses_sorted_and_refreshed() {
        let registry = Registry::new();
        registry.register("/b", constant("b"), false).unwrap();
        registry.register("/a", constant("a"), false).unwrap();
        assert_eq!(&*registry.addresses(), &["/a".to_string(), "/b".to_string()]);

        registry.register("/0", constant("0"), false).unwrap();
        assert_eq!(registry.addresses().len(), 3);
        assert_eq!(registry.addresses()[0], "/0");
    }

    #[test]
    fn test_pattern_resolution_is_memoized() {
        let registry = Registry::new();
        registry.register("/a/*", constant("wild"), false).unwrap();
        assert!(!registry.is_registered("/a/b"));

        let first = registry.resolve("/a/b").unwrap();
        assert_eq!(registry.memoized(), 1);
        let second = registry.resolve("/a/b").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.memoized(), 1);
    }

    #[test]
    fn test_exact_registration_wins_over_pattern() {
        let registry = Registry::new();
        registry.register("/a/*", constant("wild"), false).unwrap();
        registry.register("/a/b", constant("exact"), false).unwrap();

        let exact = registry.resolve("/a/b").unwrap();
        let wild = registry.resolve("/a/c").unwrap();
        assert!(!Arc::ptr_eq(&exact, &wild));
        assert_eq!(registry.memoized(), 1);
    }

    #[test]
    fn test_unmatched_address_is_denied() {
        let registry = Registry::new();
        registry.register("/secure", constant("s"), false).unwrap();

        let err = registry.resolve("/unknown").unwrap_err();
        assert_eq!(err, RouterError::AccessDenied("/unknown".into()));
        assert_eq!(registry.memoized(), 0);
    }

    #[test]
    fn test_scan_overlapping_a_registration_is_not_memoized() {
        let registry = Registry::new();
        registry.register("/a/*", constant("old"), false).unwrap();
        let stale = registry.resolve("/a/b").unwrap();
        let generation = registry.generation.load(Ordering::SeqCst);

        // A cover lands after the scan found `stale` but before it was stored.
        registry.register("/a/*", constant("new"), true).unwrap();
        registry.memoize("/a/b", &stale, generation);

        assert_eq!(registry.memoized(), 0);
        let fresh = registry.resolve("/a/b").unwrap();
        assert!(!Arc::ptr_eq(&stale, &fresh));
    }

    #[test]
    fn test_cover_of_pattern_replaces_memoized_resolution() {
        let registry = Registry::new();
        registry.register("/a/*", constant("old"), false).unwrap();
        let first = registry.resolve("/a/b").unwrap();

        registry.register("/a/*", constant("new"), true).unwrap();
        assert_eq!(registry.memoized(), 0);

        let second = registry.resolve("/a/b").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
