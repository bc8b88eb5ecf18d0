//! Variable Scope
//!
//! The flattened name→value mapping consulted during substitution. Layers
//! are merged lowest to highest precedence:
//!
//! 1. Global configuration variables
//! 2. Workflow `vars`
//! 3. Caller overrides (`--var KEY=VALUE`)
//!
//! Environment variables are not merged; the resolver consults them only
//! when a name is missing here.

use indexmap::IndexMap;
use log::{debug, warn};

/// Layered variable mapping for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableScope {
    values: IndexMap<String, String>,
}

impl VariableScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a scope from the three layers; later layers win.
    pub fn layered(
        globals: &IndexMap<String, String>,
        workflow_vars: &IndexMap<String, String>,
        overrides: &IndexMap<String, String>,
    ) -> Self {
        let mut values = IndexMap::with_capacity(globals.len() + workflow_vars.len());

        for layer in [globals, workflow_vars, overrides] {
            for (key, value) in layer {
                values.insert(key.clone(), value.clone());
            }
        }

        debug!(
            "Variable scope: {} globals, {} workflow vars, {} overrides -> {} names",
            globals.len(),
            workflow_vars.len(),
            overrides.len(),
            values.len()
        );

        Self { values }
    }

    /// Looks up a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Binds a variable, replacing any previous value.
    ///
    /// Only the sequential coordinator calls this, between steps.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over variables in merge order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableScope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Parses `KEY=VALUE` override pairs.
///
/// The value is everything after the first `=`. Entries without `=` or
/// with an empty key are ignored with a warning.
pub fn parse_overrides<I, S>(pairs: I) -> IndexMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut overrides = IndexMap::new();

    for pair in pairs {
        let pair = pair.as_ref();
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                overrides.insert(key.trim().to_string(), value.to_string());
            }
            _ => warn!("Ignoring malformed variable override '{}'", pair),
        }
    }

    overrides
}
