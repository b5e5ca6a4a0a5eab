//! Response interpretation: mapping a [`RawResponse`] to a payload or a typed
//! failure.
//!
//! The uniform status gate lives in the response pipeline
//! ([`crate::Pipeline`]) and runs before any interpreter; an interpreter only
//! sees responses the gate let through.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConnectorError;

/// Status and body of an HTTP response, as returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub content: Vec<u8>,
}

impl RawResponse {
    /// Creates a response from a status and body.
    pub fn new(status: u16, content: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content: content.into(),
        }
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Per-operation response handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseInterpreter {
    /// Parse the body as JSON and pass it through unchanged.
    #[default]
    Json,

    /// Require an exact status. The payload is the JSON body when there is
    /// one, otherwise `null`.
    ExpectStatus {
        /// The only acceptable status code.
        status: u16,
    },
}

impl ResponseInterpreter {
    /// Interprets a response that has passed the response pipeline.
    pub fn interpret(&self, response: &RawResponse) -> Result<Value, ConnectorError> {
        match self {
            ResponseInterpreter::Json => serde_json::from_slice(&response.content).map_err(|e| {
                ConnectorError::MalformedResponse {
                    body: response.body_text(),
                    reason: e.to_string(),
                }
            }),
            ResponseInterpreter::ExpectStatus { status } if response.status != *status => {
                Err(ConnectorError::UnexpectedStatus {
                    status: response.status,
                    expected: *status,
                    body: response.body_text(),
                })
            }
            ResponseInterpreter::ExpectStatus { .. } => {
                Ok(serde_json::from_slice(&response.content).unwrap_or(Value::Null))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_body_is_passed_through() {
        let payload = ResponseInterpreter::Json
            .interpret(&RawResponse::new(200, r#"{"id":7}"#))
            .unwrap();
        assert_eq!(payload, json!({ "id": 7 }));
    }

    #[test]
    fn json_arrays_are_passed_through() {
        let body = r#"[{"id":1,"tags":["a","b"]},{"id":2,"open":false}]"#;
        let payload = ResponseInterpreter::Json
            .interpret(&RawResponse::new(201, body))
            .unwrap();
        assert_eq!(payload, serde_json::from_str::<Value>(body).unwrap());
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = ResponseInterpreter::Json
            .interpret(&RawResponse::new(200, "<html>ok</html>"))
            .unwrap_err();
        match err {
            ConnectorError::MalformedResponse { body, .. } => assert_eq!(body, "<html>ok</html>"),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn empty_body_is_malformed_for_json() {
        let err = ResponseInterpreter::Json
            .interpret(&RawResponse::new(204, Vec::new()))
            .unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }

    #[test]
    fn expect_status_rejects_other_success_codes() {
        let err = ResponseInterpreter::ExpectStatus { status: 200 }
            .interpret(&RawResponse::new(204, ""))
            .unwrap_err();
        assert_eq!(
            err,
            ConnectorError::UnexpectedStatus {
                status: 204,
                expected: 200,
                body: String::new()
            }
        );
    }

    #[test]
    fn expect_status_tolerates_non_json_body() {
        let interpreter = ResponseInterpreter::ExpectStatus { status: 200 };
        assert_eq!(
            interpreter.interpret(&RawResponse::new(200, "OK")).unwrap(),
            Value::Null
        );
        assert_eq!(
            interpreter
                .interpret(&RawResponse::new(200, r#"{"healthy":true}"#))
                .unwrap(),
            json!({ "healthy": true })
        );
    }
}
