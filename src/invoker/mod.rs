//! # Invokers
//!
//! An [`Invoker`] is the strategy that actually executes a registered resource
//! against a [`Requester`]. The router never looks inside a resource: it hands
//! the requester to the invoker stored in the resolved [`Function`] and takes
//! back an [`Outcome`].
//!
//! Two strategies ship with the crate:
//!
//! - [`LocalInvoker`]: binds parameters through [`ParamBinding`] descriptors and
//!   calls an in-process [`Handler`].
//! - [`MultiInvoker`]: fans a call out to several addresses in parallel and
//!   aggregates their values in declaration order.
//!
//! Custom strategies implement [`Invoker`] and are wrapped with [`Function::new`].

mod binding;
mod local;
mod multi;

pub use binding::*;
pub use local::*;
pub use multi::*;

use crate::error::Outcome;
use crate::requester::Requester;
use crate::router::Router;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Execution strategy for a registered resource.
///
/// The router is passed explicitly so strategies can issue nested calls
/// through the full routing pipeline.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, router: &Router, requester: Arc<Requester>) -> Outcome;

    /// Short name used in logs.
    fn kind(&self) -> &'static str {
        "custom"
    }
}

/// Handler descriptor stored in the registry: an invoker together with the
/// resource it executes.
#[derive(Clone)]
pub struct Function {
    invoker: Arc<dyn Invoker>,
}

impl Function {
    pub fn new(invoker: impl Invoker + 'static) -> Self {
        Self {
            invoker: Arc::new(invoker),
        }
    }

    /// An in-process handler with its parameter bindings.
    pub fn local(handler: impl Handler + 'static, bindings: Vec<ParamBinding>) -> Self {
        Self::new(LocalInvoker::new(handler, bindings))
    }

    /// A fan-out over `targets`, aggregated in the given order.
    pub fn multi<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MultiInvoker::new(targets))
    }

    pub fn kind(&self) -> &'static str {
        self.invoker.kind()
    }

    pub async fn invoke(&self, router: &Router, requester: Arc<Requester>) -> Outcome {
        self.invoker.invoke(router, requester).await
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("kind", &self.kind()).finish()
    }
}
