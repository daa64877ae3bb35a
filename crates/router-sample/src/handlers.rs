//! Handlers registered by the sample binary.

use resource_router::{handler_fn, Function, ParamBinding, Router, RouterError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Registers every sample resource on `router`.
pub fn register_all(router: &Router) -> Result<(), RouterError> {
    router.register("/greet", greet()?, false)?;
    router.register("/slow", slow(Arc::new(AtomicU64::new(0))), false)?;

    let uploads = Arc::new(AtomicU64::new(0));
    router.register("/report/*", report(Arc::clone(&uploads)), false)?;
    router.register("/upload", upload(uploads), false)?;

    router.register("/dashboard", Function::multi(["/greet", "/report/daily"]), false)?;
    Ok(())
}

fn greet() -> Result<Function, RouterError> {
    let name = ParamBinding::new("name")
        .required()
        .pattern(r"^[A-Za-z][A-Za-z \-]*$")?;
    Ok(Function::local(
        handler_fn(|inv| async move {
            let name = inv.args.str("name").unwrap_or_default().to_string();
            Ok(Value::from(format!("hello {name}")))
        }),
        vec![name],
    ))
}

fn slow(runs: Arc<AtomicU64>) -> Function {
    Function::local(
        handler_fn(move |_| {
            let run = runs.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(json!({ "run": run }))
            }
        }),
        vec![],
    )
}

fn report(uploads: Arc<AtomicU64>) -> Function {
    Function::local(
        handler_fn(move |inv| {
            let uploads = uploads.load(Ordering::SeqCst);
            async move {
                Ok(json!({
                    "report": inv.requester.address(),
                    "user": inv.requester.user(),
                    "uploads": uploads,
                }))
            }
        }),
        vec![],
    )
}

fn upload(uploads: Arc<AtomicU64>) -> Function {
    Function::local(
        handler_fn(move |_| {
            let total = uploads.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(json!({ "uploads": total })) }
        }),
        vec![],
    )
}
