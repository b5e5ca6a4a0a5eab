//! Error types for the connector execution core.
//!
//! [`ConnectorError`] is the failure half of every `execute` result. Each
//! variant belongs to one [`FailureOrigin`]: local errors (bad bundle, bad
//! registration, bad definition) are raised before any network I/O; remote
//! errors describe what happened on the wire.
//!
//! No variant is retried by the core and none is fatal to the process; every
//! failure is scoped to the invocation that produced it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FieldType, OperationName};

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// Where a failure originated.
///
/// Lets the hosting engine tell "my connector is misconfigured" apart from
/// "the remote service rejected the call".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    /// Raised by the core before a request was sent.
    Local,
    /// Produced by the network call or by the remote service's response.
    Remote,
}

/// Which mapping of a [`crate::Bundle`] a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldScope {
    /// Operation fields, looked up in `input_data`.
    Input,
    /// Credential fields, looked up in `auth_data`.
    Credential,
}

impl std::fmt::Display for FieldScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldScope::Input => write!(f, "input"),
            FieldScope::Credential => write!(f, "credential"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failure reported by an [`crate::HttpTransport`] implementation.
///
/// Transports report only failures to obtain a response. A response with an
/// error status is not a transport error; it is handed back as a
/// [`crate::RawResponse`] and judged by the response pipeline.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportError {
    /// The request did not complete within the transport's deadline.
    #[error("request timed out: {message}")]
    Timeout {
        /// Transport-specific description.
        message: String,
    },

    /// A connection to the remote host could not be established.
    #[error("connection failed: {message}")]
    Connection {
        /// Transport-specific description.
        message: String,
    },

    /// The descriptor could not be turned into a request (bad header name,
    /// unparseable URL, unsupported method).
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Transport-specific description.
        message: String,
    },

    /// The response body could not be read.
    #[error("failed to read response body: {message}")]
    Body {
        /// Transport-specific description.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Connector errors
// ---------------------------------------------------------------------------

/// Typed failure of a single connector invocation or registration.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectorError {
    /// A required field is absent (or `null`) in the bundle.
    #[error("missing required {scope} field '{key}'")]
    MissingField {
        /// Mapping the field was looked up in.
        scope: FieldScope,
        /// Key of the missing field.
        key: String,
    },

    /// A field is present but its value has the wrong JSON type.
    #[error("{scope} field '{key}' expected {expected}, got {actual}")]
    TypeMismatch {
        /// Mapping the field was looked up in.
        scope: FieldScope,
        /// Key of the offending field.
        key: String,
        /// Type declared by the field schema.
        expected: FieldType,
        /// JSON type of the supplied value (`"string"`, `"array"`, ...).
        actual: String,
    },

    /// A credential is present and well-typed but cannot be sent in a header
    /// (for example it contains a line break). The value is never echoed.
    #[error("credential field '{key}' cannot be sent: {reason}")]
    InvalidCredential {
        /// Key of the offending credential field.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// An operation with this name is already registered.
    #[error("operation '{name}' is already registered")]
    DuplicateOperation {
        /// The colliding name.
        name: OperationName,
    },

    /// No operation with this name is registered.
    #[error("unknown operation '{name}'")]
    UnknownOperation {
        /// The requested name.
        name: String,
    },

    /// The connector definition or an operation spec is structurally invalid.
    ///
    /// Produced at load/registration time; a registry never holds an invalid spec.
    #[error("invalid connector definition: {message}")]
    InvalidDefinition {
        /// Description of the problem.
        message: String,
    },

    /// The remote service answered with a status of 400 or above.
    #[error("unexpected status code {status}")]
    HttpError {
        /// Status code returned by the remote service.
        status: u16,
        /// Response body, decoded lossily as UTF-8.
        body: String,
    },

    /// The remote service answered with a status other than the one the
    /// operation requires.
    #[error("expected status code {expected}, got {status}")]
    UnexpectedStatus {
        /// Status code returned by the remote service.
        status: u16,
        /// Status code the operation requires.
        expected: u16,
        /// Response body, decoded lossily as UTF-8.
        body: String,
    },

    /// The response status was acceptable but its body is not valid JSON.
    #[error("malformed response body: {reason}")]
    MalformedResponse {
        /// Response body, decoded lossily as UTF-8.
        body: String,
        /// Parser error message.
        reason: String,
    },

    /// The network call itself failed; no response was received.
    #[error("transport failure: {source}")]
    Transport {
        /// Failure reported by the transport.
        #[from]
        source: TransportError,
    },
}

impl ConnectorError {
    /// Returns where this failure originated.
    ///
    /// A transport that rejects a descriptor before sending it
    /// ([`TransportError::InvalidRequest`]) is a local failure: nothing
    /// reached the remote service.
    pub fn origin(&self) -> FailureOrigin {
        match self {
            ConnectorError::MissingField { .. }
            | ConnectorError::TypeMismatch { .. }
            | ConnectorError::InvalidCredential { .. }
            | ConnectorError::DuplicateOperation { .. }
            | ConnectorError::UnknownOperation { .. }
            | ConnectorError::InvalidDefinition { .. }
            | ConnectorError::Transport {
                source: TransportError::InvalidRequest { .. },
            } => FailureOrigin::Local,
            ConnectorError::HttpError { .. }
            | ConnectorError::UnexpectedStatus { .. }
            | ConnectorError::MalformedResponse { .. }
            | ConnectorError::Transport { .. } => FailureOrigin::Remote,
        }
    }

    /// Returns the stable snake_case tag of this failure (matches the
    /// serialised `kind` field).
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorError::MissingField { .. } => "missing_field",
            ConnectorError::TypeMismatch { .. } => "type_mismatch",
            ConnectorError::InvalidCredential { .. } => "invalid_credential",
            ConnectorError::DuplicateOperation { .. } => "duplicate_operation",
            ConnectorError::UnknownOperation { .. } => "unknown_operation",
            ConnectorError::InvalidDefinition { .. } => "invalid_definition",
            ConnectorError::HttpError { .. } => "http_error",
            ConnectorError::UnexpectedStatus { .. } => "unexpected_status",
            ConnectorError::MalformedResponse { .. } => "malformed_response",
            ConnectorError::Transport { .. } => "transport",
        }
    }

    /// Returns the HTTP status carried by this failure, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ConnectorError::HttpError { status, .. }
            | ConnectorError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn invalid_definition(message: impl Into<String>) -> Self {
        ConnectorError::InvalidDefinition {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_is_remote_and_carries_status() {
        let err = ConnectorError::HttpError {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.origin(), FailureOrigin::Remote);
        assert_eq!(err.http_status(), Some(404));
        assert_eq!(err.kind(), "http_error");
        assert_eq!(err.to_string(), "unexpected status code 404");
    }

    #[test]
    fn validation_errors_are_local() {
        let err = ConnectorError::MissingField {
            scope: FieldScope::Input,
            key: "ticket_id".to_string(),
        };
        assert_eq!(err.origin(), FailureOrigin::Local);
        assert_eq!(err.http_status(), None);
        assert_eq!(err.to_string(), "missing required input field 'ticket_id'");
    }

    #[test]
    fn unsendable_requests_are_local() {
        let rejected = ConnectorError::from(TransportError::InvalidRequest {
            message: "value of header 'x-api-key': failed to parse header value".to_string(),
        });
        assert_eq!(rejected.origin(), FailureOrigin::Local);
        assert_eq!(rejected.kind(), "transport");

        let refused = ConnectorError::from(TransportError::Connection {
            message: "connection refused".to_string(),
        });
        assert_eq!(refused.origin(), FailureOrigin::Remote);
    }

    #[test]
    fn serialised_kind_matches_kind_tag() {
        let errors = vec![
            ConnectorError::TypeMismatch {
                scope: FieldScope::Credential,
                key: "api_key".to_string(),
                expected: FieldType::String,
                actual: "number".to_string(),
            },
            ConnectorError::UnknownOperation {
                name: "nope".to_string(),
            },
            ConnectorError::InvalidCredential {
                key: "api_key".to_string(),
                reason: "contains a line break".to_string(),
            },
            ConnectorError::MalformedResponse {
                body: "<html>".to_string(),
                reason: "expected value".to_string(),
            },
            ConnectorError::from(TransportError::Timeout {
                message: "30s elapsed".to_string(),
            }),
        ];

        for err in errors {
            let json = serde_json::to_value(&err).unwrap();
            assert_eq!(json["kind"], err.kind());
        }
    }
}
