//! In-process channel.
//!
//! Network channels (HTTP, TCP, UDP) all do the same thing once a call is
//! decoded: build a [`Requester`] carrying the session and hand it to
//! [`Router::routing`]. [`LocalChannel`] does exactly that for callers living
//! in the same process, such as tests, the sample binary and handlers that
//! want a session-bound way to call their peers.

use crate::error::{Outcome, RouterError};
use crate::requester::{Params, Requester};
use crate::router::Router;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument};

static NEXT_CLIENT: AtomicU64 = AtomicU64::new(1);

/// A session-bound client of a [`Router`]. Clones share the session.
#[derive(Clone)]
pub struct LocalChannel {
    router: Router,
    client_id: String,
    user: Option<String>,
    locale: Option<String>,
}

impl LocalChannel {
    /// Opens a channel with a fresh client id and no user.
    pub fn new(router: Router) -> Self {
        let client_id = format!("local-{}", NEXT_CLIENT.fetch_add(1, Ordering::Relaxed));
        Self {
            router,
            client_id,
            user: None,
            locale: None,
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    #[instrument(skip(self, params), fields(client = %self.client_id))]
    pub async fn call(&self, address: &str, params: Params) -> Outcome {
        debug!(params = params.len(), "Sending request");
        let mut requester = Requester::new(address)
            .with_params(params)
            .with_client_id(self.client_id.as_str());
        if let Some(user) = &self.user {
            requester = requester.with_user(user.as_str());
        }
        if let Some(locale) = &self.locale {
            requester = requester.with_locale(locale.as_str());
        }
        self.router.routing(requester).await
    }

    /// Like [`call`](Self::call), decoding a successful value into `T`.
    pub async fn call_as<T: DeserializeOwned>(&self, address: &str, params: Params) -> Result<T, RouterError> {
        let value = self.call(address, params).await?;
        serde_json::from_value(value)
            .map_err(|e| RouterError::handler(format!("unexpected result from {address}: {e}")))
    }
}
