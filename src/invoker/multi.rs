//! Fan-out over several resources.

use super::Invoker;
use crate::error::{Outcome, RouterError};
use crate::requester::Requester;
use crate::router::Router;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Calls every target address as an independent nested request and returns
/// their values as an array, in declaration order.
///
/// Each target runs on its own task through the full routing pipeline, so
/// targets get their own events and may be served from the cache. Children
/// inherit the caller's parameters and session. A child error fails the whole
/// call; when several fail, the first in declaration order wins.
#[derive(Debug, Clone)]
pub struct MultiInvoker {
    targets: Vec<String>,
}

impl MultiInvoker {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    fn check_cycle(&self, requester: &Requester) -> Result<(), RouterError> {
        let on_path = |address: &str| {
            requester.address() == address || requester.ancestors().any(|r| r.address() == address)
        };
        match self.targets.iter().find(|target| on_path(target)) {
            Some(target) => Err(RouterError::CycleDetected(target.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Invoker for MultiInvoker {
    async fn invoke(&self, router: &Router, requester: Arc<Requester>) -> Outcome {
        self.check_cycle(&requester)?;
        debug!(address = requester.address(), targets = self.targets.len(), "Fan-out");

        let handles: Vec<_> = self
            .targets
            .iter()
            .map(|target| {
                let child = requester.build(target.as_str(), requester.params().clone());
                let router = router.clone();
                tokio::spawn(async move { router.routing(child).await })
            })
            .collect();

        let mut values = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = handle
                .await
                .map_err(|e| RouterError::Join(e.to_string()))?;
            values.push(outcome?);
        }
        Ok(Value::Array(values))
    }

    fn kind(&self) -> &'static str {
        "multi"
    }
}
