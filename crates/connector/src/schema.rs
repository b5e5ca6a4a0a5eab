//! Field schemas: the declared input and credential fields of an operation.
//!
//! A [`FieldSchema`] is an ordered, key-unique list of [`FieldSpec`]s. It is
//! consulted twice per invocation: [`FieldSchema::validate`] gates the request
//! (nothing is sent for an invalid bundle) and [`FieldSchema::resolve`] picks the
//! declared values out of the bundle for the request body.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Bundle, ConnectorError, FieldKey, FieldScope};

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

/// Runtime type a field value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// A JSON string.
    String,
    /// A JSON number (integer or float).
    Number,
    /// A JSON boolean.
    Boolean,
}

impl FieldType {
    /// Returns `true` if `value` has this type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
        }
    }
}

/// Returns the JSON type name of a value, as reported in type mismatches.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Field spec
// ---------------------------------------------------------------------------

/// One declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Key looked up in the bundle; unique within its schema.
    pub key: FieldKey,

    /// Human-readable label for form rendering. Empty when not declared.
    #[serde(default)]
    pub label: String,

    /// Whether the field must be present before a request is built.
    #[serde(default)]
    pub required: bool,

    /// Type the value must have.
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: FieldType,

    /// Value sent when the field is absent from the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_field_type() -> FieldType {
    FieldType::String
}

impl FieldSpec {
    /// Creates an optional string field with no label and no default.
    pub fn new(key: FieldKey) -> Self {
        Self {
            key,
            label: String::new(),
            required: false,
            field_type: FieldType::String,
            default: None,
        }
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the field type.
    pub fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Sets the display label.
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn check(&self, scope: FieldScope, bundle: &Bundle) -> Result<(), ConnectorError> {
        match bundle.get(scope, self.key.as_str()) {
            None if self.required => Err(ConnectorError::MissingField {
                scope,
                key: self.key.to_string(),
            }),
            None => Ok(()),
            Some(value) if !self.field_type.matches(value) => Err(ConnectorError::TypeMismatch {
                scope,
                key: self.key.to_string(),
                expected: self.field_type,
                actual: json_type_name(value).to_string(),
            }),
            Some(_) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Field schema
// ---------------------------------------------------------------------------

/// Ordered sequence of [`FieldSpec`]s with unique keys.
///
/// Keys are checked for uniqueness and defaults for type agreement on
/// construction (and therefore on deserialisation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldSpec>", into = "Vec<FieldSpec>")]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    /// Creates a schema, failing with [`ConnectorError::InvalidDefinition`] on
    /// a duplicate key or on a default whose type disagrees with its field.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, ConnectorError> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.key.as_str()) {
                return Err(ConnectorError::invalid_definition(format!(
                    "duplicate field key '{}'",
                    field.key
                )));
            }
            if let Some(default) = &field.default {
                if !field.field_type.matches(default) {
                    return Err(ConnectorError::invalid_definition(format!(
                        "default of field '{}' is {}, expected {}",
                        field.key,
                        json_type_name(default),
                        field.field_type
                    )));
                }
            }
        }
        Ok(Self { fields })
    }

    /// Returns an empty schema.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Returns `true` if no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Checks the bundle mapping selected by `scope` against this schema.
    ///
    /// Fields are checked in declaration order and the first failure is
    /// returned. Values for keys the schema does not declare are ignored.
    pub fn validate(&self, scope: FieldScope, bundle: &Bundle) -> Result<(), ConnectorError> {
        self.fields
            .iter()
            .try_for_each(|field| field.check(scope, bundle))
    }

    /// Returns the declared values for a validated bundle, keyed by field key.
    ///
    /// The map iterates in sorted key order, so encoding it is deterministic.
    /// Absent fields take their default when one is declared and are
    /// otherwise omitted. Undeclared keys never appear in the output.
    pub fn resolve(&self, scope: FieldScope, bundle: &Bundle) -> Map<String, Value> {
        let mut values = Map::new();
        for field in &self.fields {
            let value = bundle
                .get(scope, field.key.as_str())
                .or(field.default.as_ref());
            if let Some(value) = value {
                values.insert(field.key.to_string(), value.clone());
            }
        }
        values
    }
}

impl TryFrom<Vec<FieldSpec>> for FieldSchema {
    type Error = ConnectorError;

    fn try_from(fields: Vec<FieldSpec>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<FieldSchema> for Vec<FieldSpec> {
    fn from(schema: FieldSchema) -> Self {
        schema.fields
    }
}
