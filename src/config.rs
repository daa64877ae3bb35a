//! # Router Configuration
//!
//! [`RouterConfig`] is plain data, deserialized from TOML or assembled in code
//! with the `with_*` builders. Every field has a default, so an empty document
//! is a valid configuration.
//!
//! ```toml
//! filter = "/api/*"
//! sweep_interval_secs = 3600
//!
//! [forwards]
//! "/home" = "/api/home"
//!
//! [[cache_rules]]
//! target = "/api/report/*"
//! refresh = "/api/upload"
//! timeout = 300
//! scope = "user"
//! ```

use crate::cache::DEFAULT_SWEEP_INTERVAL;
use crate::error::RouterError;
use crate::rules::CacheRule;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Only addresses matching this glob are accepted by `register`.
    pub filter: Option<String>,
    /// Address rewrites applied before resolution.
    pub forwards: HashMap<String, String>,
    pub cache_rules: Vec<CacheRule>,
    /// Memory cache sweep period; zero disables the sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            filter: None,
            forwards: HashMap::new(),
            cache_rules: Vec::new(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL.as_secs(),
        }
    }
}

impl RouterConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, RouterError> {
        toml::from_str(source).map_err(|e| RouterError::config(format!("invalid router config: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RouterError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| RouterError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_forward(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.forwards.insert(from.into(), to.into());
        self
    }

    pub fn with_cache_rule(mut self, rule: CacheRule) -> Self {
        self.cache_rules.push(rule);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_secs = interval.as_secs();
        self
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}
