//! Parameter binding for local handlers.
//!
//! A [`ParamBinding`] is declared once, at registration time, for each argument
//! a handler expects. At call time [`bind`] turns the requester's raw parameter
//! map into [`Arguments`], applying defaults, the required check, regex
//! validation and the optional adapter in that order.

use crate::error::RouterError;
use crate::requester::Params;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type Adapter = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Binding rule for one handler parameter.
#[derive(Clone)]
pub struct ParamBinding {
    name: String,
    default: Option<Value>,
    pattern: Option<Regex>,
    required: bool,
    adapter: Option<Adapter>,
}

impl ParamBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            pattern: None,
            required: false,
            adapter: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Values must match `regex` (tested against their string form).
    ///
    /// An invalid expression is a configuration error, reported here rather
    /// than on the first call.
    pub fn pattern(mut self, regex: &str) -> Result<Self, RouterError> {
        let compiled = Regex::new(regex).map_err(|e| {
            RouterError::config(format!("parameter `{}`: invalid pattern: {e}", self.name))
        })?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    /// Converts the raw value before it reaches the handler.
    pub fn adapter<F>(mut self, adapter: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, params: &Params) -> Result<Value, RouterError> {
        let value = params
            .get(&self.name)
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| self.default.clone());

        let Some(value) = value else {
            if self.required {
                return Err(RouterError::parameter(&self.name, "required parameter missing"));
            }
            return Ok(Value::Null);
        };

        if let Some(pattern) = &self.pattern {
            let text = match &value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !pattern.is_match(&text) {
                return Err(RouterError::parameter(
                    &self.name,
                    format!("value `{text}` does not match `{}`", pattern.as_str()),
                ));
            }
        }

        match &self.adapter {
            Some(adapter) => adapter(value).map_err(|reason| RouterError::parameter(&self.name, reason)),
            None => Ok(value),
        }
    }
}

impl fmt::Debug for ParamBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamBinding")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("required", &self.required)
            .field("adapter", &self.adapter.is_some())
            .finish()
    }
}

/// Arguments handed to a handler after binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<(String, Value)>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Deserializes the named argument, reporting a coercion failure as
    /// [`RouterError::ParameterInvalid`].
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, RouterError> {
        let value = self.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| RouterError::parameter(name, e.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Binds `params` through `bindings`.
///
/// With no bindings every parameter is passed through, sorted by name.
/// Otherwise only the declared parameters are bound, in declaration order.
pub fn bind(bindings: &[ParamBinding], params: &Params) -> Result<Arguments, RouterError> {
    if bindings.is_empty() {
        let mut values: Vec<(String, Value)> =
            params.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        return Ok(Arguments { values });
    }

    let values = bindings
        .iter()
        .map(|binding| Ok((binding.name.clone(), binding.apply(params)?)))
        .collect::<Result<Vec<_>, RouterError>>()?;
    Ok(Arguments { values })
}
