//! # Resource Router
//!
//! > **Named, parameterized calls resolved, cached and observed in one place.**
//!
//! Clients submit *resource calls*: an address such as `/report/daily` plus a
//! parameter map. Transports decode them into a [`Requester`] and hand it to
//! [`Router::routing`], which resolves a registered handler, runs it (or serves
//! it from cache), and notifies lifecycle listeners along the way.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One pipeline for every call
//! Whether a call comes from a network channel, a handler calling a peer, or a
//! fan-out resource, it goes through the same steps:
//! forward, resolve, before, invoke (or cache), after/error, complete.
//! Cross-cutting behavior lives in listeners and cache rules, never in handlers.
//!
//! ### Errors are values
//! [`Router::routing`] returns an [`Outcome`]; it does not panic on handler
//! failure and does not hide errors behind logs. Every [`RouterError`] variant
//! is cheap to clone, so the same error can be returned, cached in an event,
//! and asserted on in tests.
//!
//! ### Declarative caching
//! Cache behavior is configuration, not code: a [`CacheRule`] names which
//! addresses to cache and which other addresses invalidate them. Rules are
//! expanded once against the registered address space.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Resolution
//! Registration keys may be glob patterns. Concrete addresses resolved through
//! a pattern are memoized, and concurrent first lookups of the same address
//! are serialized by a per-address lock ([`keyed_lock`]).
//!
//! ### 2. Concurrency Model
//! The [`Router`] is a clonable handle shared by every task. Cached calls use
//! double-checked locking on a per-key async lock so each key is computed at
//! most once at a time while other keys proceed. Fan-out resources run each child on its own Tokio task.
//!
//! ### 3. Explicit Context
//! Handlers receive an [`Invocation`] carrying the bound arguments, the
//! requester and the router. There is no ambient "current request".
//!
//! ### 4. Observability
//! `tracing` spans wrap every routed call; see [`lifecycle::tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`router`], [`registry`], [`rules`])
//! - **Role**: resolves addresses, decides cacheable vs not, drives the pipeline.
//! - **Key items**: [`Router`], [`Registry`](registry::Registry), [`RuleTable`](rules::RuleTable).
//!
//! ### 2. The Strategies ([`invoker`])
//! - **Role**: executes a resolved resource.
//! - **Key items**: [`Function`], [`LocalInvoker`](invoker::LocalInvoker),
//!   [`MultiInvoker`](invoker::MultiInvoker), [`ParamBinding`].
//!
//! ### 3. The Storage ([`cache`])
//! - **Role**: pluggable cache backends behind [`CacheEngine`](cache::CacheEngine).
//! - **Key items**: [`MemoryCache`](cache::MemoryCache), [`RemoteCache`](cache::RemoteCache),
//!   [`cache_key`](cache::cache_key).
//!
//! ### 4. The Edges ([`channel`], [`event`], [`config`], [`lifecycle`])
//! - **Role**: how calls come in, who observes them, how the router is configured.
//! - **Key items**: [`LocalChannel`], [`InvokeListener`], [`RouterConfig`].
//!
//! ## 🚀 Quick Start
//!
//! ```rust,ignore
//! let router = Router::new(RouterConfig::default());
//! router.register(
//!     "/greet",
//!     Function::local(
//!         handler_fn(|inv| async move {
//!             Ok(format!("hello {}", inv.args.str("name").unwrap_or("world")).into())
//!         }),
//!         vec![ParamBinding::new("name").required()],
//!     ),
//!     false,
//! )?;
//!
//! let value = router.routing(Requester::new("/greet").with_param("name", "Bob")).await?;
//! assert_eq!(value, "hello Bob");
//! ```
//!
//! ### Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run -p router-sample
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```
//!
//! ## 🧪 Testing
//!
//! See [`mock`] for an in-memory key/value store and a recording listener.

pub mod cache;
pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod invoker;
pub mod keyed_lock;
pub mod lifecycle;
pub mod mock;
pub mod pattern;
pub mod registry;
pub mod requester;
pub mod router;
pub mod rules;

pub use channel::LocalChannel;
pub use config::RouterConfig;
pub use error::{Outcome, RouterError};
pub use event::{EventKind, InvokeEvent, InvokeListener, TracingListener};
pub use invoker::{handler_fn, Function, Handler, Invocation, Invoker, ParamBinding};
pub use requester::{Params, Requester};
pub use router::Router;
pub use rules::{CacheRule, CacheScope};
