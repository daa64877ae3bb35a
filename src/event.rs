//! # Invocation Events
//!
//! Every routed call passes through four phases, each with its own listener
//! list:
//!
//! | Phase      | Fired                                   | Carries            |
//! |------------|-----------------------------------------|--------------------|
//! | `Before`   | after resolution, before invoking       | requester          |
//! | `After`    | on success only                         | requester, value   |
//! | `Error`    | on any failure after resolution         | requester, error   |
//! | `Complete` | always, exactly once per call           | requester, outcome |
//!
//! Listeners run in registration order and only observe. A listener error is
//! **not** isolated: it stops the remaining listeners of that phase, and in the
//! before and after phases it becomes the call's error outcome.

use crate::error::{Outcome, RouterError};
use crate::requester::Requester;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Which phase a listener subscribes to. `All` subscribes to every phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Before,
    After,
    Error,
    Complete,
    All,
}

#[derive(Debug, Clone)]
pub enum InvokeEvent {
    Before {
        requester: Arc<Requester>,
    },
    After {
        requester: Arc<Requester>,
        value: Value,
    },
    Error {
        requester: Arc<Requester>,
        error: RouterError,
    },
    Complete {
        requester: Arc<Requester>,
        outcome: Outcome,
    },
}

impl InvokeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InvokeEvent::Before { .. } => EventKind::Before,
            InvokeEvent::After { .. } => EventKind::After,
            InvokeEvent::Error { .. } => EventKind::Error,
            InvokeEvent::Complete { .. } => EventKind::Complete,
        }
    }

    pub fn requester(&self) -> &Arc<Requester> {
        match self {
            InvokeEvent::Before { requester }
            | InvokeEvent::After { requester, .. }
            | InvokeEvent::Error { requester, .. }
            | InvokeEvent::Complete { requester, .. } => requester,
        }
    }

    /// True for error events and for complete events whose outcome is an error.
    pub fn is_failed(&self) -> bool {
        match self {
            InvokeEvent::Error { .. } => true,
            InvokeEvent::Complete { outcome, .. } => outcome.is_err(),
            _ => false,
        }
    }

    /// The call's outcome, when this phase knows it.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            InvokeEvent::Before { .. } => None,
            InvokeEvent::After { value, .. } => Some(Ok(value.clone())),
            InvokeEvent::Error { error, .. } => Some(Err(error.clone())),
            InvokeEvent::Complete { outcome, .. } => Some(outcome.clone()),
        }
    }
}

/// Observer of invocation events.
#[async_trait]
pub trait InvokeListener: Send + Sync {
    async fn on_event(&self, event: &InvokeEvent) -> Result<(), RouterError>;
}

type ListenerList = RwLock<Vec<Arc<dyn InvokeListener>>>;

/// The four listener lists owned by a router.
#[derive(Default)]
pub struct Listeners {
    before: ListenerList,
    after: ListenerList,
    error: ListenerList,
    complete: ListenerList,
}

impl Listeners {
    pub fn add(&self, kind: EventKind, listener: Arc<dyn InvokeListener>) {
        match kind {
            EventKind::All => {
                for list in [&self.before, &self.after, &self.error, &self.complete] {
                    list.write().push(Arc::clone(&listener));
                }
            }
            kind => self.list(kind).write().push(listener),
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::All => [&self.before, &self.after, &self.error, &self.complete]
                .iter()
                .map(|list| list.read().len())
                .sum(),
            kind => self.list(kind).read().len(),
        }
    }

    /// Delivers `event` to its phase's listeners, stopping at the first error.
    pub async fn dispatch(&self, event: &InvokeEvent) -> Result<(), RouterError> {
        // Snapshot so no lock is held across listener awaits.
        let listeners: Vec<Arc<dyn InvokeListener>> = self.list(event.kind()).read().clone();
        for listener in listeners {
            listener.on_event(event).await?;
        }
        Ok(())
    }

    fn list(&self, kind: EventKind) -> &ListenerList {
        match kind {
            EventKind::Before => &self.before,
            EventKind::After => &self.after,
            EventKind::Error => &self.error,
            // `All` is fanned out in `add`; it never names a single list.
            EventKind::Complete | EventKind::All => &self.complete,
        }
    }
}

/// Audit listener writing one structured log line per completed call.
#[derive(Debug, Default, Clone)]
pub struct TracingListener;

#[async_trait]
impl InvokeListener for TracingListener {
    async fn on_event(&self, event: &InvokeEvent) -> Result<(), RouterError> {
        if let InvokeEvent::Complete { requester, outcome } = event {
            let elapsed_ms = (chrono::Utc::now() - requester.created_at()).num_milliseconds();
            match outcome {
                Ok(_) => info!(
                    address = requester.address(),
                    user = requester.user(),
                    elapsed_ms,
                    "Invoke complete"
                ),
                Err(e) => warn!(
                    address = requester.address(),
                    user = requester.user(),
                    elapsed_ms,
                    error = %e,
                    "Invoke failed"
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingListener;

    fn before() -> InvokeEvent {
        InvokeEvent::Before {
            requester: Arc::new(Requester::new("/x")),
        }
    }

    #[tokio::test]
    async fn test_all_registers_into_every_phase() {
        let listeners = Listeners::default();
        listeners.add(EventKind::All, Arc::new(RecordingListener::new()));
        listeners.add(EventKind::Error, Arc::new(RecordingListener::new()));

        assert_eq!(listeners.count(EventKind::Before), 1);
        assert_eq!(listeners.count(EventKind::Error), 2);
        assert_eq!(listeners.count(EventKind::All), 5);
    }

    #[tokio::test]
    async fn test_dispatch_in_registration_order() {
        let listeners = Listeners::default();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            listeners.add(EventKind::Before, Arc::new(RecordingListener::named(name, Arc::clone(&order))));
        }

        listeners.dispatch(&before()).await.unwrap();

        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_failing_listener_stops_the_phase() {
        let listeners = Listeners::default();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        listeners.add(EventKind::Before, Arc::new(RecordingListener::named("first", Arc::clone(&order))));
        listeners.add(EventKind::Before, Arc::new(RecordingListener::failing(RouterError::handler("nope"))));
        listeners.add(EventKind::Before, Arc::new(RecordingListener::named("third", Arc::clone(&order))));

        let result = listeners.dispatch(&before()).await;

        assert_eq!(result, Err(RouterError::handler("nope")));
        assert_eq!(*order.lock(), vec!["first"], "listeners after the failing one are skipped");
    }

    #[test]
    fn test_is_failed() {
        let requester = Arc::new(Requester::new("/x"));
        let ok = InvokeEvent::Complete {
            requester: Arc::clone(&requester),
            outcome: Ok(Value::Null),
        };
        let failed = InvokeEvent::Complete {
            requester,
            outcome: Err(RouterError::AccessDenied("/x".into())),
        };
        assert!(!ok.is_failed());
        assert!(failed.is_failed());
        assert!(!before().is_failed());
    }
}
