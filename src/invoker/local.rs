//! In-process handlers.

use super::binding::{bind, Arguments, ParamBinding};
use super::Invoker;
use crate::error::{Outcome, RouterError};
use crate::requester::Requester;
use crate::router::Router;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

/// Everything a handler gets for one call.
///
/// The router travels with the call so a handler can issue nested requests,
/// typically derived with [`Requester::build`].
pub struct Invocation {
    pub args: Arguments,
    pub requester: Arc<Requester>,
    pub router: Router,
}

/// Business logic bound to an address.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, invocation: Invocation) -> Result<Value, RouterError>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wraps `f` as a [`Handler`].
///
/// ```ignore
/// let greet = handler_fn(|inv| async move {
///     Ok(format!("hello {}", inv.args.str("name").unwrap_or("world")).into())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, RouterError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, RouterError>> + Send + 'static,
{
    async fn call(&self, invocation: Invocation) -> Result<Value, RouterError> {
        (self.f)(invocation).await
    }
}

/// Binds parameters and calls a local [`Handler`].
pub struct LocalInvoker {
    handler: Arc<dyn Handler>,
    bindings: Vec<ParamBinding>,
}

impl LocalInvoker {
    pub fn new(handler: impl Handler + 'static, bindings: Vec<ParamBinding>) -> Self {
        Self {
            handler: Arc::new(handler),
            bindings,
        }
    }
}

#[async_trait]
impl Invoker for LocalInvoker {
    async fn invoke(&self, router: &Router, requester: Arc<Requester>) -> Outcome {
        let args = bind(&self.bindings, requester.params())?;
        trace!(address = requester.address(), args = args.len(), "Bound parameters");
        self.handler
            .call(Invocation {
                args,
                requester,
                router: router.clone(),
            })
            .await
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}
