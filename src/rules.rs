//! # Cache Rules
//!
//! Cache behavior is declared as a list of [`CacheRule`]s, each naming a
//! `target` pattern (what to cache) and optionally a `refresh` pattern (which
//! resources invalidate it when they succeed).
//!
//! Rules are not evaluated per request. [`RuleTable::expand`] runs once
//! against the full, sorted address space and produces two lookup maps:
//!
//! ```text
//! targets:          /report/daily  -> rule{ timeout: 60, scope: user }
//! refresh_triggers: /report/upload -> { /report/daily, /report/weekly }
//! ```
//!
//! For each address the rules are tried in declaration order. The first rule
//! whose target matches wins and stops evaluation for that address. A rule
//! whose target does not match but whose refresh pattern does registers every
//! *other* address matching the target as a dependent, plus the target
//! itself, and evaluation goes on with the next rule. The target entry
//! covers concrete calls served by a pattern registration, which are cached
//! under keys no registration names.

use crate::error::RouterError;
use crate::pattern;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Whether a cached value is shared by everyone or kept per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    #[default]
    Global,
    User,
}

/// One declarative cache rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheRule {
    pub target: String,
    #[serde(default)]
    pub refresh: Option<String>,
    /// Seconds; zero never expires.
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub scope: CacheScope,
}

impl CacheRule {
    pub fn new(target: impl Into<String>) -> Result<Self, RouterError> {
        let target = target.into();
        if target.is_empty() {
            return Err(RouterError::config("cache rule target must not be empty"));
        }
        Ok(Self {
            target,
            refresh: None,
            timeout: 0,
            scope: CacheScope::Global,
        })
    }

    pub fn refresh(mut self, pattern: impl Into<String>) -> Self {
        self.refresh = Some(pattern.into());
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn scope(mut self, scope: CacheScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    fn refreshed_by(&self, address: &str) -> bool {
        self.refresh
            .as_deref()
            .is_some_and(|refresh| pattern::matches(refresh, address))
    }
}

/// What the rules say about a single address.
#[derive(Debug, Default)]
struct Evaluation {
    rule: Option<Arc<CacheRule>>,
    dependents: BTreeSet<String>,
}

/// Rules expanded against a fixed address space.
#[derive(Debug, Default)]
pub struct RuleTable {
    rules: Vec<Arc<CacheRule>>,
    addresses: Vec<String>,
    targets: HashMap<String, Arc<CacheRule>>,
    refresh_triggers: HashMap<String, BTreeSet<String>>,
}

impl RuleTable {
    /// Expands `rules` against `addresses`.
    ///
    /// Fails with [`RouterError::Configuration`] if any rule has an empty
    /// target. A rule matching nothing is kept but inert.
    pub fn expand(addresses: &[String], rules: &[CacheRule]) -> Result<RuleTable, RouterError> {
        if let Some(index) = rules.iter().position(|rule| rule.target.is_empty()) {
            return Err(RouterError::config(format!(
                "cache rule #{index} has an empty target"
            )));
        }

        let mut sorted = addresses.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut table = RuleTable {
            rules: rules.iter().cloned().map(Arc::new).collect(),
            addresses: sorted,
            ..RuleTable::default()
        };

        for address in &table.addresses {
            let evaluation = table.evaluate(address);
            if let Some(rule) = evaluation.rule {
                table.targets.insert(address.clone(), rule);
            }
            if !evaluation.dependents.is_empty() {
                table
                    .refresh_triggers
                    .insert(address.clone(), evaluation.dependents);
            }
        }
        Ok(table)
    }

    fn evaluate(&self, address: &str) -> Evaluation {
        let mut evaluation = Evaluation::default();
        for rule in &self.rules {
            if pattern::matches(&rule.target, address) {
                evaluation.rule = Some(Arc::clone(rule));
                break;
            }
            if rule.refreshed_by(address) {
                // Concrete calls served by a pattern registration are cached
                // under keys no registration names; the target covers them.
                evaluation.dependents.insert(rule.target.clone());
                evaluation.dependents.extend(
                    self.addresses
                        .iter()
                        .filter(|other| other.as_str() != address)
                        .filter(|other| pattern::matches(&rule.target, other))
                        .cloned(),
                );
            }
        }
        evaluation
    }

    /// The rule caching `address`, if any.
    ///
    /// Addresses outside the expanded space (concrete calls served by a
    /// pattern registration) are evaluated on the fly with the same rules.
    pub fn rule_for(&self, address: &str) -> Option<Arc<CacheRule>> {
        match self.targets.get(address) {
            Some(rule) => Some(Arc::clone(rule)),
            None if self.is_known(address) => None,
            None => self.evaluate(address).rule,
        }
    }

    /// Addresses whose cached values a successful call to `address` invalidates.
    pub fn dependents(&self, address: &str) -> Vec<String> {
        match self.refresh_triggers.get(address) {
            Some(dependents) => dependents.iter().cloned().collect(),
            None if self.is_known(address) => Vec::new(),
            None => self.evaluate(address).dependents.into_iter().collect(),
        }
    }

    pub fn targets(&self) -> &HashMap<String, Arc<CacheRule>> {
        &self.targets
    }

    pub fn refresh_triggers(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.refresh_triggers
    }

    fn is_known(&self, address: &str) -> bool {
        self.addresses
            .binary_search_by(|probe| probe.as_str().cmp(address))
            .is_ok()
    }
}
