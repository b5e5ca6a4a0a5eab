//! The operation registry and the `execute` entry point.
//!
//! An [`OperationRegistry`] is filled once at startup and is read-only
//! afterwards, so one registry can serve any number of concurrent
//! invocations without locking. Each invocation moves through
//! [`InvocationState`]s in order and either reaches `Succeeded` or stops at
//! `Failed`; validation failures stop before a request is built, so an invalid
//! bundle never reaches the transport.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn, Instrument};

use crate::{
    BodyTemplate, Bundle, ConnectorError, FieldSchema, FieldScope, HttpTransport, InvocationId,
    OperationName, Pipeline, RequestDescriptor, RequestTemplate, ResponseInterpreter,
};

// ---------------------------------------------------------------------------
// Operation spec
// ---------------------------------------------------------------------------

/// What role an operation plays for the hosting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Verifies that the supplied credentials are accepted.
    AuthenticationTest,
    /// Polled by the engine to produce events.
    Trigger,
    /// Invoked on demand to cause a side effect.
    Action,
    /// Invoked on demand to look records up.
    Search,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::AuthenticationTest => write!(f, "authentication_test"),
            OperationKind::Trigger => write!(f, "trigger"),
            OperationKind::Action => write!(f, "action"),
            OperationKind::Search => write!(f, "search"),
        }
    }
}

/// Complete, immutable description of one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    /// Unique name within the registry.
    pub name: OperationName,
    /// Role of the operation.
    pub kind: OperationKind,
    /// Noun the operation acts on (e.g. `"Ticket"`).
    pub noun: String,
    /// Short label shown by the engine's UI.
    pub display_label: String,
    /// One-sentence description shown by the engine's UI.
    pub display_description: String,
    /// Input fields, validated against `input_data`.
    pub fields: FieldSchema,
    /// How the request is built.
    pub request: RequestTemplate,
    /// How a gated response is turned into a payload.
    pub interpreter: ResponseInterpreter,
}

/// Declarative surface of an operation, as consumed by a UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSurface<'a> {
    pub name: &'a OperationName,
    pub kind: OperationKind,
    pub noun: &'a str,
    pub display_label: &'a str,
    pub display_description: &'a str,
    pub fields: &'a FieldSchema,
}

impl OperationSpec {
    /// Returns the declarative surface of this operation.
    pub fn surface(&self) -> OperationSurface<'_> {
        OperationSurface {
            name: &self.name,
            kind: self.kind,
            noun: &self.noun,
            display_label: &self.display_label,
            display_description: &self.display_description,
            fields: &self.fields,
        }
    }
}

// ---------------------------------------------------------------------------
// Invocation states
// ---------------------------------------------------------------------------

/// Progress of a single `execute` call. Recorded on tracing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Received,
    Validating,
    Building,
    Requesting,
    Interpreting,
    Succeeded,
    Failed,
}

impl InvocationState {
    /// Returns `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, InvocationState::Succeeded | InvocationState::Failed)
    }
}

impl std::fmt::Display for InvocationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvocationState::Received => "received",
            InvocationState::Validating => "validating",
            InvocationState::Building => "building",
            InvocationState::Requesting => "requesting",
            InvocationState::Interpreting => "interpreting",
            InvocationState::Succeeded => "succeeded",
            InvocationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name-indexed set of operations sharing one credential schema, one
/// pipeline and one transport.
pub struct OperationRegistry {
    credentials: FieldSchema,
    pipeline: Pipeline,
    transport: Arc<dyn HttpTransport>,
    operations: IndexMap<OperationName, OperationSpec>,
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("credentials", &self.credentials)
            .field("pipeline", &self.pipeline)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl OperationRegistry {
    /// Creates an empty registry.
    ///
    /// `credentials` is validated against `auth_data` on every invocation;
    /// `pipeline` wraps every request and response.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        pipeline: Pipeline,
        credentials: FieldSchema,
    ) -> Self {
        Self {
            credentials,
            pipeline,
            transport,
            operations: IndexMap::new(),
        }
    }

    /// Adds an operation.
    ///
    /// Fails with [`ConnectorError::DuplicateOperation`] if the name is taken
    /// (the existing entry is kept) and with
    /// [`ConnectorError::InvalidDefinition`] if the request URL is not absolute.
    pub fn register(&mut self, spec: OperationSpec) -> Result<(), ConnectorError> {
        if self.operations.contains_key(&spec.name) {
            return Err(ConnectorError::DuplicateOperation { name: spec.name });
        }
        spec.request.validate()?;
        if !spec.fields.is_empty() && spec.request.body == BodyTemplate::None {
            return Err(ConnectorError::invalid_definition(format!(
                "operation '{}' declares input fields but sends no body",
                spec.name
            )));
        }
        info!(operation = %spec.name, kind = %spec.kind, "Registered operation");
        self.operations.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Returns the operation registered under `name`.
    pub fn get(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.get(name)
    }

    /// Returns all operations in registration order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.values()
    }

    /// Returns the number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the credential schema.
    pub fn credential_fields(&self) -> &FieldSchema {
        &self.credentials
    }

    /// Returns the declarative surface of every operation, in registration order.
    pub fn describe(&self) -> Vec<OperationSurface<'_>> {
        self.operations().map(OperationSpec::surface).collect()
    }

    /// Validates `bundle` and builds the request `execute` would send,
    /// without sending it.
    pub fn build_request(
        &self,
        name: &str,
        bundle: &Bundle,
    ) -> Result<RequestDescriptor, ConnectorError> {
        let spec = self.lookup(name)?;
        self.prepare(spec, bundle)
    }

    /// Runs one operation end to end.
    ///
    /// Validation, registration and definition errors are returned before any
    /// network call. Remote failures are returned as typed errors; nothing is
    /// retried.
    pub async fn execute(&self, name: &str, bundle: &Bundle) -> Result<Value, ConnectorError> {
        let invocation = InvocationId::new_random();
        let span = tracing::info_span!("connector.execute", operation = %name, %invocation);

        async move {
            debug!(state = %InvocationState::Received, "Invocation received");
            let result = self.run(name, bundle).await;
            match &result {
                Ok(_) => debug!(state = %InvocationState::Succeeded, "Invocation succeeded"),
                Err(e) => warn!(
                    state = %InvocationState::Failed,
                    kind = e.kind(),
                    origin = ?e.origin(),
                    status = e.http_status(),
                    error = %e,
                    "Invocation failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, name: &str, bundle: &Bundle) -> Result<Value, ConnectorError> {
        let spec = self.lookup(name)?;
        let request = self.prepare(spec, bundle)?;

        debug!(
            state = %InvocationState::Requesting,
            method = %request.method,
            url = %request.url,
            "Sending request"
        );
        let response = self.transport.send(&request).await?;

        debug!(
            state = %InvocationState::Interpreting,
            status = response.status,
            bytes = response.content.len(),
            "Interpreting response"
        );
        self.pipeline.interpret(&spec.interpreter, &response)
    }

    fn lookup(&self, name: &str) -> Result<&OperationSpec, ConnectorError> {
        self.operations
            .get(name)
            .ok_or_else(|| ConnectorError::UnknownOperation {
                name: name.to_string(),
            })
    }

    fn prepare(
        &self,
        spec: &OperationSpec,
        bundle: &Bundle,
    ) -> Result<RequestDescriptor, ConnectorError> {
        debug!(state = %InvocationState::Validating, "Validating bundle");
        self.credentials.validate(FieldScope::Credential, bundle)?;
        spec.fields.validate(FieldScope::Input, bundle)?;

        debug!(state = %InvocationState::Building, "Building request");
        let request = spec.request.build(&spec.fields, bundle)?;
        self.pipeline.prepare(request, bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldKey, FieldSpec, HttpMethod, RawResponse, TransportError};
    use async_trait::async_trait;

    struct NeverCalled;

    #[async_trait]
    impl HttpTransport for NeverCalled {
        async fn send(&self, _: &RequestDescriptor) -> Result<RawResponse, TransportError> {
            panic!("transport must not be called");
        }
    }

    fn spec(name: &str, url: &str) -> OperationSpec {
        OperationSpec {
            name: OperationName::new(name).unwrap(),
            kind: OperationKind::Action,
            noun: "Ticket".to_string(),
            display_label: "Label".to_string(),
            display_description: "Description".to_string(),
            fields: FieldSchema::new(vec![
                FieldSpec::new(FieldKey::new("ticket_id").unwrap()).required()
            ])
            .unwrap(),
            request: RequestTemplate::new(HttpMethod::Post, url).with_body(BodyTemplate::Json {
                constants: serde_json::Map::new(),
            }),
            interpreter: ResponseInterpreter::Json,
        }
    }

    fn registry() -> OperationRegistry {
        OperationRegistry::new(Arc::new(NeverCalled), Pipeline::default(), FieldSchema::empty())
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let mut registry = registry();
        registry.register(spec("assign", "https://a.example.com")).unwrap();

        let err = registry
            .register(spec("assign", "https://b.example.com"))
            .unwrap_err();
        assert_eq!(
            err,
            ConnectorError::DuplicateOperation {
                name: OperationName::new("assign").unwrap()
            }
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("assign").unwrap().request.url, "https://a.example.com");
    }

    #[test]
    fn relative_url_is_rejected_at_registration() {
        let mut registry = registry();
        let err = registry.register(spec("assign", "/tickets/assign")).unwrap_err();
        assert_eq!(err.kind(), "invalid_definition");
        assert!(registry.is_empty());
    }

    #[test]
    fn url_with_invalid_host_is_rejected_at_registration() {
        let mut registry = registry();
        let err = registry
            .register(spec("assign", "https://exa mple.com/x"))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_definition");
        assert!(registry.is_empty());
    }

    #[test]
    fn fields_without_a_body_are_rejected() {
        let mut registry = registry();
        let mut bodyless = spec("find", "https://example.com/tickets");
        bodyless.request.body = BodyTemplate::None;

        let err = registry.register(bodyless).unwrap_err();
        assert!(err.to_string().contains("declares input fields but sends no body"));
        assert!(registry.is_empty());
    }

    #[test]
    fn describe_keeps_registration_order() {
        let mut registry = registry();
        registry.register(spec("zeta", "https://example.com")).unwrap();
        registry.register(spec("alpha", "https://example.com")).unwrap();

        let names: Vec<_> = registry.describe().iter().map(|s| s.name.to_string()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn surface_serialises_fields() {
        let spec = spec("assign", "https://example.com");
        let json = serde_json::to_value(spec.surface()).unwrap();
        assert_eq!(json["kind"], "action");
        assert_eq!(json["fields"][0]["key"], "ticket_id");
        assert_eq!(json["fields"][0]["required"], true);
    }

    #[tokio::test]
    async fn unknown_operation_is_reported() {
        let err = registry().execute("missing", &Bundle::new()).await.unwrap_err();
        assert_eq!(
            err,
            ConnectorError::UnknownOperation {
                name: "missing".to_string()
            }
        );
    }

    #[tokio::test]
    async fn invalid_bundle_never_reaches_transport() {
        let mut registry = registry();
        registry.register(spec("assign", "https://example.com")).unwrap();

        let err = registry.execute("assign", &Bundle::new()).await.unwrap_err();
        assert_eq!(err.kind(), "missing_field");
    }

    #[test]
    fn terminal_states() {
        assert!(InvocationState::Succeeded.is_terminal());
        assert!(InvocationState::Failed.is_terminal());
        assert!(!InvocationState::Requesting.is_terminal());
    }
}
