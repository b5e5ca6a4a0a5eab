//! Request and response stages applied around every operation.
//!
//! A [`Pipeline`] is an ordered list of pure request transformers and an
//! ordered list of response checks. The registry runs the request stages on
//! every built descriptor before it is sent, and the response stages on every
//! raw response before the operation's own [`ResponseInterpreter`] sees it.
//! Stages hold no state; one pipeline is shared by all concurrent invocations.

use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Bundle, ConnectorError, FieldKey, FieldScope, RawResponse, RequestDescriptor,
    ResponseInterpreter,
};

/// Header every request carries unless the operation sets its own.
pub const CONTENT_TYPE: &str = "Content-Type";

/// Default content type of connector requests.
pub const APPLICATION_JSON: &str = "application/json";

/// First status code treated as an error by the standard status gate.
pub const ERROR_STATUS_THRESHOLD: u16 = 400;

// ---------------------------------------------------------------------------
// Authentication schemes
// ---------------------------------------------------------------------------

/// How credentials from `auth_data` are attached to outgoing requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// Credentials are validated but not sent.
    #[default]
    None,

    /// The credential value is sent verbatim in a named header.
    ApiKeyHeader {
        /// Header name (e.g. `X-Api-Key`).
        header: String,
        /// Credential field holding the key.
        field: FieldKey,
    },

    /// The credential value is sent as `Authorization: Bearer <value>`.
    Bearer {
        /// Credential field holding the token.
        field: FieldKey,
    },
}

impl AuthScheme {
    /// Returns the credential field this scheme reads, if any.
    pub fn field(&self) -> Option<&FieldKey> {
        match self {
            AuthScheme::None => None,
            AuthScheme::ApiKeyHeader { field, .. } | AuthScheme::Bearer { field } => Some(field),
        }
    }

    /// Checks that the scheme's header name is a valid HTTP header name.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if let AuthScheme::ApiKeyHeader { header, .. } = self {
            HeaderName::from_bytes(header.as_bytes()).map_err(|e| {
                ConnectorError::invalid_definition(format!(
                    "authentication header name '{header}' is invalid: {e}"
                ))
            })?;
        }
        Ok(())
    }

    fn header(&self, bundle: &Bundle) -> Result<Option<(String, String)>, ConnectorError> {
        let Some(field) = self.field() else {
            return Ok(None);
        };
        let Some(credential) = bundle.get(FieldScope::Credential, field.as_str()) else {
            return Ok(None);
        };
        let credential = match credential {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let header = match self {
            AuthScheme::None => return Ok(None),
            AuthScheme::ApiKeyHeader { header, .. } => (header.clone(), credential),
            AuthScheme::Bearer { .. } => {
                ("Authorization".to_string(), format!("Bearer {credential}"))
            }
        };

        // The error text from `http` never includes the value.
        HeaderValue::from_str(&header.1).map_err(|e| ConnectorError::InvalidCredential {
            key: field.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(header))
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// A pure transformation applied to every outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestStage {
    /// Sets a header unless the request already carries it (any case).
    DefaultHeader {
        /// Header name.
        name: String,
        /// Header value.
        value: String,
    },

    /// Attaches credentials from `auth_data`. Skipped when the credential is
    /// absent; fails with [`ConnectorError::InvalidCredential`] when it cannot
    /// be encoded as a header value.
    Credential {
        /// Scheme used to attach the credential.
        scheme: AuthScheme,
    },
}

impl RequestStage {
    /// Applies the stage.
    pub fn apply(
        &self,
        mut request: RequestDescriptor,
        bundle: &Bundle,
    ) -> Result<RequestDescriptor, ConnectorError> {
        match self {
            RequestStage::DefaultHeader { name, value } => {
                request.set_header_if_absent(name, value);
            }
            RequestStage::Credential { scheme } => {
                if let Some((name, value)) = scheme.header(bundle)? {
                    request.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
                    request.headers.insert(name, value);
                }
            }
        }
        Ok(request)
    }
}

/// A check applied to every raw response before interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseStage {
    /// Fails with [`ConnectorError::HttpError`] for any status at or above
    /// `threshold`, regardless of the body.
    StatusGate {
        /// First failing status code.
        threshold: u16,
    },
}

impl ResponseStage {
    /// Applies the stage.
    pub fn check(&self, response: &RawResponse) -> Result<(), ConnectorError> {
        match self {
            ResponseStage::StatusGate { threshold } if response.status >= *threshold => {
                Err(ConnectorError::HttpError {
                    status: response.status,
                    body: response.body_text(),
                })
            }
            ResponseStage::StatusGate { .. } => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Ordered request and response stages shared by every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Applied in order to each built request.
    #[serde(default)]
    pub request: Vec<RequestStage>,
    /// Applied in order to each raw response; the first failure wins.
    #[serde(default)]
    pub response: Vec<ResponseStage>,
}

impl Pipeline {
    /// The pipeline every connector gets: JSON content type, credential
    /// injection with `auth`, and a status gate at 400.
    pub fn standard(auth: AuthScheme) -> Self {
        Self {
            request: vec![
                RequestStage::DefaultHeader {
                    name: CONTENT_TYPE.to_string(),
                    value: APPLICATION_JSON.to_string(),
                },
                RequestStage::Credential { scheme: auth },
            ],
            response: vec![ResponseStage::StatusGate {
                threshold: ERROR_STATUS_THRESHOLD,
            }],
        }
    }

    /// Runs all request stages; the first failure wins.
    pub fn prepare(
        &self,
        request: RequestDescriptor,
        bundle: &Bundle,
    ) -> Result<RequestDescriptor, ConnectorError> {
        self.request
            .iter()
            .try_fold(request, |request, stage| stage.apply(request, bundle))
    }

    /// Runs all response stages, then the operation's interpreter.
    pub fn interpret(
        &self,
        interpreter: &ResponseInterpreter,
        response: &RawResponse,
    ) -> Result<Value, ConnectorError> {
        for stage in &self.response {
            stage.check(response)?;
        }
        interpreter.interpret(response)
    }
}
