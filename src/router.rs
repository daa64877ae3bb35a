//! # Router
//!
//! The [`Router`] is the single entry point for every call. It owns the
//! [`Registry`], the cache backend, the expanded cache rules and the listener
//! lists, and drives each request through the same pipeline:
//!
//! ```text
//! forward rewrite -> resolve -> before -> [cache | invoke + invalidate] -> after
//!                                  \________________ error ________________/
//!                                                    complete (always, once)
//! ```
//!
//! ## Caching
//!
//! A resource is cacheable when a [`CacheRule`] targets its address. Cached
//! calls use double-checked locking keyed by the cache key itself:
//!
//! 1. Look the key up; a hit returns immediately.
//! 2. Otherwise take that key's lock, look again, compute, store the value.
//!
//! So a key is computed at most once at a time, and unrelated keys never
//! wait on each other. A handler may route nested calls freely, cached or
//! not. A nested call back to its own key is reported as
//! [`RouterError::CycleDetected`].
//!
//! A successful call to a non-cacheable resource drops the cache namespace of
//! every address it refreshes without waiting for computations in flight.
//! Each invalidation bumps an epoch instead; a computation that overlapped
//! one removes its entry again after storing it, so a value that may predate
//! the refresh is returned to its caller but never served from the cache.
//!
//! ## Handle
//!
//! `Router` is a cheap `Arc` handle: clone it into tasks and handlers freely.

use crate::cache::{cache_key, namespace, CacheEngine, MemoryCache};
use crate::config::RouterConfig;
use crate::error::{Outcome, RouterError};
use crate::event::{EventKind, InvokeEvent, InvokeListener, Listeners};
use crate::invoker::Function;
use crate::pattern;
use crate::registry::Registry;
use crate::requester::Requester;
use crate::rules::{CacheRule, RuleTable};
use crate::keyed_lock::AsyncKeyedLocks;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

struct Inner {
    config: RouterConfig,
    registry: Registry,
    cache: Arc<dyn CacheEngine>,
    rules: OnceCell<RuleTable>,
    flights: AsyncKeyedLocks,
    epoch: AtomicU64,
    listeners: Listeners,
}

#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

// =============================================================================
// 1. CONSTRUCTION & REGISTRATION
// =============================================================================

impl Router {
    /// A router over an in-process [`MemoryCache`].
    ///
    /// Inside a Tokio runtime the cache gets a background sweeper running at
    /// the configured interval; outside one, expired entries are only dropped
    /// when read.
    pub fn new(config: RouterConfig) -> Self {
        let cache = match (config.sweep_interval(), tokio::runtime::Handle::try_current()) {
            (Some(interval), Ok(_)) => MemoryCache::with_sweeper(interval),
            _ => MemoryCache::new(),
        };
        Self::with_cache(config, Arc::new(cache))
    }

    /// A router over any [`CacheEngine`], e.g. a [`RemoteCache`](crate::cache::RemoteCache).
    pub fn with_cache(config: RouterConfig, cache: Arc<dyn CacheEngine>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry: Registry::new(),
                cache,
                rules: OnceCell::new(),
                flights: AsyncKeyedLocks::new(),
                epoch: AtomicU64::new(0),
                listeners: Listeners::default(),
            }),
        }
    }

    /// Registers `function` under `address` (which may be a pattern).
    ///
    /// Returns `Ok(false)` when the configured filter rejects the address,
    /// and [`RouterError::DuplicateRegistration`] when it is taken and
    /// `cover` is false. Cache rules are expanded on the first call, so
    /// register everything before traffic starts.
    pub fn register(
        &self,
        address: impl Into<String>,
        function: Function,
        cover: bool,
    ) -> Result<bool, RouterError> {
        let address = address.into();
        if let Some(filter) = &self.inner.config.filter {
            if !pattern::matches(filter, &address) {
                debug!(%address, %filter, "Registration filtered out");
                return Ok(false);
            }
        }
        if self.inner.rules.get().is_some() {
            warn!(%address, "Registered after initialization; cache rules not re-expanded");
        }
        self.inner.registry.register(address, function, cover)?;
        Ok(true)
    }

    pub fn is_registered(&self, address: &str) -> bool {
        self.inner.registry.is_registered(address)
    }

    /// Sorted registration keys.
    pub fn addresses(&self) -> Arc<[String]> {
        self.inner.registry.addresses()
    }

    pub fn add_listener(&self, kind: EventKind, listener: Arc<dyn InvokeListener>) {
        self.inner.listeners.add(kind, listener);
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.count(kind)
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &Arc<dyn CacheEngine> {
        &self.inner.cache
    }

    /// Expands the cache rules against the registered addresses.
    ///
    /// Runs once; later calls (and the implicit call on the first request)
    /// return the same tables.
    pub fn initialize(&self) -> Result<(), RouterError> {
        self.rules().map(|_| ())
    }

    fn rules(&self) -> Result<&RuleTable, RouterError> {
        self.inner.rules.get_or_try_init(|| {
            let addresses = self.inner.registry.addresses();
            let table = RuleTable::expand(&addresses, &self.inner.config.cache_rules)?;
            info!(
                resources = addresses.len(),
                cached = table.targets().len(),
                triggers = table.refresh_triggers().len(),
                "Router initialized"
            );
            Ok(table)
        })
    }

    /// Releases the cache backend (stopping the memory sweeper).
    pub async fn shutdown(&self) -> Result<(), RouterError> {
        info!("Shutting down router...");
        self.inner.cache.destroy().await?;
        info!("Router shutdown complete.");
        Ok(())
    }
}

// =============================================================================
// 2. REQUEST PIPELINE
// =============================================================================

impl Router {
    /// Routes one call and returns its outcome.
    ///
    /// Never panics on handler failure: every error, including an unknown
    /// address, comes back as `Err` and reaches the complete listeners.
    pub async fn routing(&self, requester: impl Into<Arc<Requester>>) -> Outcome {
        self.route(requester.into()).await
    }

    #[instrument(name = "routing", skip_all, fields(address = %requester.address()))]
    async fn route(&self, requester: Arc<Requester>) -> Outcome {
        let requester = self.forward(requester);

        let function = match self.inner.registry.resolve(requester.address()) {
            Ok(function) => function,
            Err(error) => {
                warn!(error = %error, "Resolve failed");
                let outcome = Err(error);
                self.complete(&requester, &outcome).await;
                return outcome;
            }
        };
        debug!(kind = function.kind(), "Resolved");

        let outcome = self.pipeline(&function, &requester).await;

        if let Err(error) = &outcome {
            warn!(error = %error, "Invoke failed");
            let event = InvokeEvent::Error {
                requester: Arc::clone(&requester),
                error: error.clone(),
            };
            if let Err(e) = self.inner.listeners.dispatch(&event).await {
                warn!(error = %e, "Error listener failed");
            }
        }
        self.complete(&requester, &outcome).await;
        outcome
    }

    fn forward(&self, requester: Arc<Requester>) -> Arc<Requester> {
        match self.inner.config.forwards.get(requester.address()) {
            Some(target) => {
                debug!(to = %target, "Forward");
                requester.build(target.as_str(), requester.params().clone())
            }
            None => requester,
        }
    }

    /// The before, invoke and after phases. Any error ends the pipeline.
    async fn pipeline(&self, function: &Function, requester: &Arc<Requester>) -> Outcome {
        self.inner
            .listeners
            .dispatch(&InvokeEvent::Before {
                requester: Arc::clone(requester),
            })
            .await?;

        let value = self.execute(function, requester).await?;

        self.inner
            .listeners
            .dispatch(&InvokeEvent::After {
                requester: Arc::clone(requester),
                value: value.clone(),
            })
            .await?;
        Ok(value)
    }

    async fn complete(&self, requester: &Arc<Requester>, outcome: &Outcome) {
        let event = InvokeEvent::Complete {
            requester: Arc::clone(requester),
            outcome: outcome.clone(),
        };
        if let Err(e) = self.inner.listeners.dispatch(&event).await {
            warn!(error = %e, "Complete listener failed");
        }
    }

    async fn execute(&self, function: &Function, requester: &Arc<Requester>) -> Outcome {
        let rules = self.rules()?;
        if let Some(rule) = rules.rule_for(requester.address()) {
            return self.cached(function, requester, &rule).await;
        }

        let value = function.invoke(self, Arc::clone(requester)).await?;
        let dependents = rules.dependents(requester.address());
        if !dependents.is_empty() {
            self.invalidate(&dependents).await?;
        }
        Ok(value)
    }

    // =========================================================================
    // 3. CACHE
    // =========================================================================

    async fn cached(&self, function: &Function, requester: &Arc<Requester>, rule: &CacheRule) -> Outcome {
        let key = cache_key(requester, rule.scope);
        if let Some(content) = self.inner.cache.get(&key).await?.into_content() {
            debug!(%key, "Cache hit");
            return Ok(content);
        }

        // The key's lock is held by an ancestor; waiting on it would never end.
        let reentrant = requester
            .ancestors()
            .any(|ancestor| ancestor.address() == requester.address() && cache_key(ancestor, rule.scope) == key);
        if reentrant {
            return Err(RouterError::CycleDetected(requester.address().to_string()));
        }

        let _flight = self.inner.flights.lock(&key).await;
        // Another caller may have filled the key while we waited.
        if let Some(content) = self.inner.cache.get(&key).await?.into_content() {
            debug!(%key, "Cache hit after wait");
            return Ok(content);
        }

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        debug!(%key, "Cache miss");
        let value = function.invoke(self, Arc::clone(requester)).await?;
        self.inner
            .cache
            .set(&key, value.clone(), rule.timeout_duration())
            .await?;
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!(%key, "Invalidated while computing");
            self.inner.cache.remove(&key).await?;
        }
        Ok(value)
    }

    async fn invalidate(&self, dependents: &[String]) -> Result<(), RouterError> {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        for dependent in dependents {
            let pattern = namespace(dependent);
            debug!(%pattern, "Invalidate");
            self.inner.cache.remove(&pattern).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::handler_fn;
    use crate::mock::RecordingListener;
    use crate::rules::CacheScope;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Function {
        let counter = Arc::clone(counter);
        Function::local(
            handler_fn(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(Value::from(n)) }
            }),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_filter_skips_registration() {
        let router = Router::new(RouterConfig::default().with_filter("/api/*"));
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(router.register("/api/a", counting(&calls), false), Ok(true));
        assert_eq!(router.register("/internal", counting(&calls), false), Ok(false));
        assert!(router.is_registered("/api/a"));
        assert!(!router.is_registered("/internal"));
    }

    #[tokio::test]
    async fn test_forward_rewrites_before_resolve() {
        let router = Router::new(RouterConfig::default().with_forward("/old", "/new"));
        router
            .register(
                "/new",
                Function::local(
                    handler_fn(|inv| async move {
                        let parent = inv.requester.parent().map(|p| p.address().to_string());
                        Ok(json!({ "at": inv.requester.address(), "from": parent }))
                    }),
                    vec![],
                ),
                false,
            )
            .unwrap();

        let value = router.routing(Requester::new("/old")).await.unwrap();
        assert_eq!(value, json!({ "at": "/new", "from": "/old" }));
    }

    #[tokio::test]
    async fn test_unknown_address_fires_only_complete() {
        let router = Router::new(RouterConfig::default());
        let recorder = Arc::new(RecordingListener::new());
        router.add_listener(EventKind::All, recorder.clone());

        let outcome = router.routing(Requester::new("/missing")).await;

        assert_eq!(outcome, Err(RouterError::AccessDenied("/missing".into())));
        assert_eq!(recorder.kinds(), vec![EventKind::Complete]);
    }

    #[tokio::test]
    async fn test_cached_call_computes_once() {
        let router = Router::new(RouterConfig::default().with_cache_rule(CacheRule::new("/n").unwrap()));
        let calls = Arc::new(AtomicUsize::new(0));
        router.register("/n", counting(&calls), false).unwrap();

        assert_eq!(router.routing(Requester::new("/n")).await, Ok(json!(1)));
        assert_eq!(router.routing(Requester::new("/n")).await, Ok(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Different parameters are a different key.
        assert_eq!(router.routing(Requester::new("/n").with_param("p", 1)).await, Ok(json!(2)));
    }

    #[tokio::test]
    async fn test_user_scope_separates_users() {
        let rule = CacheRule::new("/me").unwrap().scope(CacheScope::User);
        let router = Router::new(RouterConfig::default().with_cache_rule(rule));
        let calls = Arc::new(AtomicUsize::new(0));
        router.register("/me", counting(&calls), false).unwrap();

        let alice = router.routing(Requester::new("/me").with_user("alice")).await;
        let bob = router.routing(Requester::new("/me").with_user("bob")).await;
        let alice_again = router.routing(Requester::new("/me").with_user("alice")).await;

        assert_eq!(alice, Ok(json!(1)));
        assert_eq!(bob, Ok(json!(2)));
        assert_eq!(alice_again, Ok(json!(1)));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let router = Router::new(RouterConfig::default().with_cache_rule(CacheRule::new("/flaky").unwrap()));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        router
            .register(
                "/flaky",
                Function::local(
                    handler_fn(move |_| {
                        let n = counter.fetch_add(1, Ordering::SeqCst);
                        async move {
                            if n == 0 {
                                Err(RouterError::handler("first call fails"))
                            } else {
                                Ok(json!("ok"))
                            }
                        }
                    }),
                    vec![],
                ),
                false,
            )
            .unwrap();

        assert!(router.routing(Requester::new("/flaky")).await.is_err());
        assert_eq!(router.routing(Requester::new("/flaky")).await, Ok(json!("ok")));
        assert_eq!(router.routing(Requester::new("/flaky")).await, Ok(json!("ok")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_rule_target_fails_initialization() {
        let mut config = RouterConfig::default();
        config.cache_rules.push(CacheRule {
            target: String::new(),
            refresh: None,
            timeout: 0,
            scope: CacheScope::Global,
        });
        let router = Router::new(config);

        assert!(matches!(router.initialize(), Err(RouterError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_nested_call_to_own_key_is_a_cycle() {
        let router = Router::new(RouterConfig::default().with_cache_rule(CacheRule::new("/loop").unwrap()));
        router
            .register(
                "/loop",
                Function::local(
                    handler_fn(|inv| async move {
                        let again = inv.requester.build("/loop", inv.requester.params().clone());
                        inv.router.routing(again).await
                    }),
                    vec![],
                ),
                false,
            )
            .unwrap();

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            router.routing(Requester::new("/loop")),
        )
        .await
        .expect("a self-call must not wait on its own key");

        assert_eq!(outcome, Err(RouterError::CycleDetected("/loop".into())));
        assert!(router.inner.flights.is_empty());
    }
}
