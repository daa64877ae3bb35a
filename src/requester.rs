//! # Requester
//!
//! A [`Requester`] describes one logical call: which address, with which
//! parameters, on behalf of whom. Channels create one per inbound call; the
//! router and invokers derive children from it with [`Requester::build`] for
//! forwarded and fan-out calls. A requester is immutable once built and is
//! shared behind an `Arc` for the lifetime of the call.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Parameter map carried by a requester. Keys are case-sensitive.
pub type Params = HashMap<String, Value>;

/// One in-flight call.
#[derive(Debug, Clone)]
pub struct Requester {
    address: String,
    params: Params,
    user: Option<String>,
    locale: Option<String>,
    client_id: Option<String>,
    created_at: DateTime<Utc>,
    parent: Option<Arc<Requester>>,
}

impl Requester {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            params: Params::new(),
            user: None,
            locale: None,
            client_id: None,
            created_at: Utc::now(),
            parent: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
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

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Derives a child call on the same session: user, locale and client id are
    /// inherited, `self` becomes the parent.
    pub fn build(self: &Arc<Self>, address: impl Into<String>, params: Params) -> Arc<Requester> {
        Arc::new(Requester {
            address: address.into(),
            params,
            user: self.user.clone(),
            locale: self.locale.clone(),
            client_id: self.client_id.clone(),
            created_at: Utc::now(),
            parent: Some(Arc::clone(self)),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn parent(&self) -> Option<&Arc<Requester>> {
        self.parent.as_ref()
    }

    /// Iterates this requester's ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Requester> {
        std::iter::successors(self.parent.as_deref(), |r| r.parent.as_deref())
    }
}
