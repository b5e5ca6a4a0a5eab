//! Per-invocation input supplied by the hosting engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::FieldScope;

/// Input values and credentials for one invocation.
///
/// Supplied by the hosting engine per `execute` call and borrowed immutably
/// for its whole duration. Both mappings are JSON objects keyed by field key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bundle {
    /// Operation field values, keyed by field key.
    #[serde(alias = "inputData")]
    pub input_data: Map<String, Value>,

    /// Credential values, keyed by credential field key.
    #[serde(alias = "authData")]
    pub auth_data: Map<String, Value>,
}

impl Bundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an input value, returning the bundle for chaining.
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input_data.insert(key.into(), value.into());
        self
    }

    /// Adds a credential value, returning the bundle for chaining.
    pub fn with_auth(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.auth_data.insert(key.into(), value.into());
        self
    }

    /// Returns the mapping a field of the given scope is looked up in.
    pub fn values(&self, scope: FieldScope) -> &Map<String, Value> {
        match scope {
            FieldScope::Input => &self.input_data,
            FieldScope::Credential => &self.auth_data,
        }
    }

    /// Looks up a value, treating an explicit `null` as absent.
    pub fn get(&self, scope: FieldScope, key: &str) -> Option<&Value> {
        self.values(scope).get(key).filter(|v| !v.is_null())
    }
}
