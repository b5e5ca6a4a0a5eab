//! Request building: turning a validated bundle into a [`RequestDescriptor`].
//!
//! Each operation carries a [`RequestTemplate`] whose [`BodyTemplate`] variant
//! selects how the body is shaped. Building is deterministic: equal templates,
//! schemas and bundles produce byte-identical descriptors.

use std::collections::BTreeMap;

use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::{Bundle, ConnectorError, FieldSchema, FieldScope};

// ---------------------------------------------------------------------------
// HTTP method
// ---------------------------------------------------------------------------

/// HTTP request method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Returns the method as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request descriptor
// ---------------------------------------------------------------------------

/// A fully built HTTP request, ready to hand to an [`crate::HttpTransport`].
///
/// Header names are matched case-insensitively by the accessor methods; the
/// map itself keeps the spelling they were inserted with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Absolute URL.
    pub url: String,
    /// Request method.
    pub method: HttpMethod,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Serialised body, if any.
    pub body: Option<String>,
}

impl RequestDescriptor {
    /// Returns the value of a header, matching its name case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if a header with this name is set (any case).
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Sets a header unless one with the same name (any case) already exists.
    pub fn set_header_if_absent(&mut self, name: &str, value: &str) {
        if !self.has_header(name) {
            self.headers.insert(name.to_string(), value.to_string());
        }
    }

    /// Parses the body as JSON. Returns `None` when there is no body or it is
    /// not valid JSON.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// How the request body is shaped from the bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodyTemplate {
    /// No body is sent.
    #[default]
    None,

    /// A single JSON object holding the schema's resolved input values and
    /// `constants` (which win on key collisions). Keys are encoded in sorted
    /// order.
    Json {
        /// Fixed members added to every body.
        #[serde(default)]
        constants: Map<String, Value>,
    },
}

/// Static description of one operation's HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    /// Request method.
    #[serde(default)]
    pub method: HttpMethod,

    /// Absolute URL of the endpoint.
    pub url: String,

    /// Headers set by the operation; these take precedence over pipeline defaults.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Body shape.
    #[serde(default)]
    pub body: BodyTemplate,
}

impl RequestTemplate {
    /// Creates a body-less template.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: BodyTemplate::None,
        }
    }

    /// Replaces the body template.
    pub fn with_body(mut self, body: BodyTemplate) -> Self {
        self.body = body;
        self
    }

    /// Adds an operation header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Checks that the URL is an absolute `http(s)` URL with a host and that
    /// every operation header can be put on the wire.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        let url = Url::parse(&self.url).map_err(|e| {
            ConnectorError::invalid_definition(format!(
                "request url '{}' is invalid: {e}",
                self.url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
            return Err(ConnectorError::invalid_definition(format!(
                "request url '{}' is not an absolute http(s) url",
                self.url
            )));
        }

        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ConnectorError::invalid_definition(format!("header name '{name}' is invalid: {e}"))
            })?;
            HeaderValue::from_str(value).map_err(|e| {
                ConnectorError::invalid_definition(format!("value of header '{name}' is invalid: {e}"))
            })?;
        }
        Ok(())
    }

    /// Builds the request for a bundle that has already passed `schema`
    /// validation.
    pub fn build(
        &self,
        schema: &FieldSchema,
        bundle: &Bundle,
    ) -> Result<RequestDescriptor, ConnectorError> {
        let body = match &self.body {
            BodyTemplate::None => None,
            BodyTemplate::Json { constants } => {
                let mut object = schema.resolve(FieldScope::Input, bundle);
                for (key, value) in constants {
                    object.insert(key.clone(), value.clone());
                }
                let encoded = serde_json::to_string(&object).map_err(|e| {
                    ConnectorError::invalid_definition(format!("failed to encode body: {e}"))
                })?;
                Some(encoded)
            }
        };

        Ok(RequestDescriptor {
            url: self.url.clone(),
            method: self.method,
            headers: self.headers.clone(),
            body,
        })
    }
}
