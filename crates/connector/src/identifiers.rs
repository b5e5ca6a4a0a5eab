//! Newtype connector identifiers.
//!
//! Names that carry identity inside a connector (operations, fields, the
//! connector itself) are distinct newtypes wrapping a `String`. This prevents
//! accidentally looking up an operation with a field key even though both are
//! strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display,
// Borrow<str> (for map lookups by &str) and a deserialiser that rejects "".
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).ok_or_else(|| {
                    serde::de::Error::custom(concat!(stringify!($name), " must not be empty"))
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (configuration names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a connector (e.g. `"helpdesk"`).
    ConnectorName
}

string_id! {
    /// Identifies an operation within a registry (e.g. `"assign_ticket"`).
    ///
    /// Operation names are unique per registry; the authentication test is
    /// registered under [`OperationName::authentication_test`].
    OperationName
}

string_id! {
    /// Identifies a field within one field schema (e.g. `"ticket_id"`).
    ///
    /// Keys are unique per schema and name the entry looked up in either
    /// `input_data` or `auth_data` of a [`crate::Bundle`].
    FieldKey
}

impl OperationName {
    /// Name under which the connector's authentication test is registered.
    pub const AUTHENTICATION_TEST: &'static str = "authentication_test";

    /// Returns the reserved name of the authentication test operation.
    pub fn authentication_test() -> Self {
        Self(Self::AUTHENTICATION_TEST.to_string())
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single `execute` call.
///
/// Generated fresh for every invocation and recorded on its tracing span so
/// request and response events from one invocation can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Generates a new random invocation identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
