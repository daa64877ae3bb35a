//! # Resource Router Sample
//!
//! Wires a router from `router.toml`, registers a handful of resources and
//! drives them through a [`LocalChannel`]:
//!
//! 1. A plain call (`/greet`) and the same call through a forward (`/hello`).
//! 2. A denied call to an address nobody registered.
//! 3. A slow cached resource, called twice.
//! 4. A user-scoped cached report, invalidated by `/upload`.
//! 5. A fan-out (`/dashboard`) over several resources.
//!
//! ```bash
//! RUST_LOG=info cargo run -p router-sample
//! RUST_LOG=debug cargo run -p router-sample -- path/to/router.toml
//! ```

mod handlers;

use resource_router::lifecycle::setup_tracing;
use resource_router::{EventKind, LocalChannel, Params, Router, RouterConfig, TracingListener};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, Instrument};

const DEFAULT_CONFIG: &str = include_str!("../router.toml");

#[derive(Debug, Deserialize)]
struct Report {
    report: String,
    uploads: u64,
}

fn params(value: serde_json::Value) -> Params {
    serde_json::from_value(value).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => RouterConfig::load(path),
        None => RouterConfig::from_toml_str(DEFAULT_CONFIG),
    }
    .map_err(|e| e.to_string())?;

    let router = Router::new(config);
    handlers::register_all(&router).map_err(|e| e.to_string())?;
    router.add_listener(EventKind::Complete, Arc::new(TracingListener));
    router.initialize().map_err(|e| e.to_string())?;

    info!(resources = router.addresses().len(), "Starting sample");

    let channel = LocalChannel::new(router.clone()).with_user("alice");

    // 1. Plain and forwarded calls
    let span = tracing::info_span!("greeting");
    async {
        let direct = channel.call("/greet", params(json!({ "name": "Bob" }))).await;
        let forwarded = channel.call("/hello", params(json!({ "name": "Ada" }))).await;
        info!(?direct, ?forwarded, "Greeted");
    }
    .instrument(span)
    .await;

    // 2. Unknown address
    match channel.call("/admin", Params::new()).await {
        Ok(value) => error!(%value, "Unexpected access"),
        Err(e) => info!(error = %e, "Denied as expected"),
    }

    // 3. Cached slow resource
    let span = tracing::info_span!("caching");
    async {
        for attempt in 1..=2 {
            let start = Instant::now();
            let value = channel.call("/slow", Params::new()).await;
            info!(attempt, elapsed_ms = start.elapsed().as_millis() as u64, ?value, "Slow call");
        }
    }
    .instrument(span)
    .await;

    // 4. Invalidation
    let span = tracing::info_span!("invalidation");
    async {
        let before: Result<Report, _> = channel.call_as("/report/daily", Params::new()).await;
        channel.call("/upload", Params::new()).await.map_err(|e| e.to_string())?;
        let after: Result<Report, _> = channel.call_as("/report/daily", Params::new()).await;
        match (before, after) {
            (Ok(before), Ok(after)) => info!(
                report = %after.report,
                before = before.uploads,
                after = after.uploads,
                "Report refreshed"
            ),
            (before, after) => error!(?before, ?after, "Report failed"),
        }
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;

    // 5. Fan-out
    match channel.call("/dashboard", params(json!({ "name": "Alice" }))).await {
        Ok(value) => info!(%value, "Dashboard"),
        Err(e) => error!(error = %e, "Dashboard failed"),
    }

    router.shutdown().await.map_err(|e| e.to_string())?;

    info!("Sample completed successfully");
    Ok(())
}
