//! # Observability & Tracing
//!
//! Structured logging for the router, built on the `tracing` crate.
//!
//! ## Overview
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter filtered
//! by `RUST_LOG`. Module paths are hidden (`with_target(false)`); every line
//! carries its context as structured fields instead (`address`, `key`,
//! `client`).
//!
//! ## What Gets Traced
//!
//! - **Lifecycle** (`info`): rule expansion, cache sweeper start/stop, shutdown
//! - **Requests** (`debug`): forward rewrites, resolution, cache hit/miss,
//!   invalidated namespaces
//! - **Failures** (`warn`): failed resolution and invocation, listener errors,
//!   cache store outages
//!
//! Each routed call runs inside a `routing{address=...}` span, and channel
//! calls inside a `call{client=...}` span, so nested fan-out calls show their
//! full path.
//!
//! ## Usage
//!
//! ```bash
//! # Lifecycle and failures only
//! RUST_LOG=info cargo run -p router-sample
//!
//! # Per-request detail, including cache decisions
//! RUST_LOG=debug cargo run -p router-sample
//!
//! # Only the cache layer
//! RUST_LOG=resource_router::cache=debug cargo run -p router-sample
//! ```
//!
//! With `RUST_LOG=debug` a cached call looks like:
//!
//! ```text
//! DEBUG call:routing: Resolved client="local-1" address="/slow" kind="local"
//! DEBUG call:routing: Cache miss client="local-1" address="/slow" key="{/slow}"
//! DEBUG call:routing: Resolved client="local-1" address="/slow" kind="local"
//! DEBUG call:routing: Cache hit client="local-1" address="/slow" key="{/slow}"
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // fields carry the context; module paths add noise
        .compact() // spans render inline, e.g. "call:routing"
        .init();
}
