//! # Router Errors
//!
//! Every failure the router can produce is a variant of [`RouterError`]. The
//! variants are plain values: cheap to clone, comparable, and free of captured
//! backtraces, because most of them (`AccessDenied`, `ParameterInvalid`) are
//! expected control flow on the request path rather than bugs.
//!
//! Handler failures are never raised past [`Router::routing`](crate::Router::routing).
//! They come back inside the returned [`Outcome`] and are delivered to the error
//! and complete listeners as well.

use crate::cache::CacheError;
use serde_json::Value;

/// Errors produced while registering, resolving or invoking resources.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RouterError {
    /// No handler resolves for the requested address.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// A parameter was missing, failed validation, or could not be adapted.
    #[error("Parameter invalid: {name} ({reason})")]
    ParameterInvalid { name: String, reason: String },

    /// The address is already registered and the registration did not ask to cover it.
    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    /// Malformed configuration, detected at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A fan-out resource references an address already on its own call path.
    #[error("Cycle detected: {0}")]
    CycleDetected(String),

    /// The cache backend failed for this operation.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The handler's own failure, carried through unchanged.
    #[error("Handler error: {0}")]
    Handler(String),

    /// A nested task panicked or was cancelled before producing an outcome.
    #[error("Nested invocation failed: {0}")]
    Join(String),
}

impl RouterError {
    pub fn parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        RouterError::ParameterInvalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn handler(message: impl Into<String>) -> Self {
        RouterError::Handler(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        RouterError::Configuration(message.into())
    }
}

/// The result of one routed call: the handler's value, or the error it ended with.
pub type Outcome = Result<Value, RouterError>;
