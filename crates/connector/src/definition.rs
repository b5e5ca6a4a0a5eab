//! Declarative connector definitions and the [`Connector`] built from them.
//!
//! A connector is described in TOML: a name and version, an authentication
//! section (credential fields, how credentials are attached, and an optional
//! test request), and lists of triggers, actions and searches. Loading a
//! definition validates it; [`Connector::from_definition`] compiles it into an
//! [`OperationRegistry`] wired to the standard pipeline.
//!
//! ```toml
//! name = "helpdesk"
//! version = "1.0.0"
//!
//! [authentication]
//! scheme = { type = "api_key_header", header = "X-Api-Key", field = "api_key" }
//! fields = [{ key = "api_key", label = "API Key", required = true, type = "string" }]
//!
//! [authentication.test]
//! expect_status = 200
//! request = { method = "GET", url = "https://api.helpdesk.com/v1/health" }
//!
//! [[actions]]
//! name = "assign_ticket"
//! noun = "Ticket"
//! label = "Assign Ticket"
//! description = "Assign the ticket to the next available senior support agent."
//! fields = [{ key = "ticket_id", required = true, type = "string" }]
//! request = { method = "POST", url = "https://api.helpdesk.com/v1/tickets/assign", body = { type = "json", constants = { agent_role = "senior" } } }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AuthScheme, Bundle, ConnectorError, ConnectorName, FieldSchema, HttpTransport, OperationKind,
    OperationName, OperationRegistry, OperationSpec, OperationSurface, Pipeline, RequestDescriptor,
    RequestTemplate, ResponseInterpreter,
};

// ---------------------------------------------------------------------------
// Definition document
// ---------------------------------------------------------------------------

/// Top-level connector definition document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorDefinition {
    /// Connector name.
    pub name: ConnectorName,

    /// Connector version, reported by `describe`.
    #[serde(default = "default_version")]
    pub version: String,

    /// Credential fields, injection scheme and test request.
    #[serde(default)]
    pub authentication: AuthenticationDefinition,

    #[serde(default)]
    pub triggers: Vec<OperationDefinition>,

    #[serde(default)]
    pub actions: Vec<OperationDefinition>,

    #[serde(default)]
    pub searches: Vec<OperationDefinition>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// The `[authentication]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationDefinition {
    /// How credentials are attached to requests.
    #[serde(default)]
    pub scheme: AuthScheme,

    /// Credential fields, validated against `auth_data`.
    #[serde(default)]
    pub fields: FieldSchema,

    /// Request used to check credentials. Registered as `authentication_test`.
    #[serde(default)]
    pub test: Option<AuthenticationTest>,
}

/// The `[authentication.test]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationTest {
    /// Status the remote service returns for valid credentials.
    #[serde(default = "default_expect_status")]
    pub expect_status: u16,

    /// Request sent to check credentials.
    pub request: RequestTemplate,
}

fn default_expect_status() -> u16 {
    200
}

/// One entry of `[[triggers]]`, `[[actions]]` or `[[searches]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDefinition {
    pub name: OperationName,
    pub noun: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: FieldSchema,
    pub request: RequestTemplate,
    #[serde(default)]
    pub response: ResponseInterpreter,
}

impl OperationDefinition {
    fn into_spec(self, kind: OperationKind) -> OperationSpec {
        OperationSpec {
            name: self.name,
            kind,
            noun: self.noun,
            display_label: self.label,
            display_description: self.description,
            fields: self.fields,
            request: self.request,
            interpreter: self.response,
        }
    }
}

impl ConnectorDefinition {
    /// Parses and validates a TOML definition.
    pub fn from_toml_str(source: &str) -> Result<Self, ConnectorError> {
        let definition: Self = toml::from_str(source)
            .map_err(|e| ConnectorError::invalid_definition(e.to_string()))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Checks cross-section rules that serde cannot express.
    ///
    /// - the auth scheme's credential field is declared in `authentication.fields`;
    /// - no operation uses the reserved `authentication_test` name;
    /// - every request URL is absolute.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        self.authentication.scheme.validate()?;
        if let Some(field) = self.authentication.scheme.field() {
            let declared = self
                .authentication
                .fields
                .fields()
                .iter()
                .any(|f| &f.key == field);
            if !declared {
                return Err(ConnectorError::invalid_definition(format!(
                    "authentication scheme reads undeclared credential field '{field}'"
                )));
            }
        }

        if let Some(test) = &self.authentication.test {
            test.request.validate()?;
        }

        for op in self.operations() {
            if op.name.as_str() == OperationName::AUTHENTICATION_TEST {
                return Err(ConnectorError::invalid_definition(format!(
                    "operation name '{}' is reserved",
                    op.name
                )));
            }
            op.request.validate()?;
        }
        Ok(())
    }

    fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.triggers
            .iter()
            .chain(self.actions.iter())
            .chain(self.searches.iter())
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// A loaded connector: metadata plus its operation registry.
#[derive(Debug)]
pub struct Connector {
    name: ConnectorName,
    version: String,
    registry: OperationRegistry,
}

/// Declarative surface of a whole connector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectorSurface<'a> {
    pub name: &'a ConnectorName,
    pub version: &'a str,
    pub authentication_fields: &'a FieldSchema,
    pub operations: Vec<OperationSurface<'a>>,
}

impl Connector {
    /// Compiles a definition into a registry using the standard pipeline.
    ///
    /// Operations are registered in the order: authentication test, triggers,
    /// actions, searches. Duplicate names fail with
    /// [`ConnectorError::DuplicateOperation`].
    pub fn from_definition(
        definition: ConnectorDefinition,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConnectorError> {
        definition.validate()?;

        let ConnectorDefinition {
            name,
            version,
            authentication,
            triggers,
            actions,
            searches,
        } = definition;

        let pipeline = Pipeline::standard(authentication.scheme);
        let mut registry = OperationRegistry::new(transport, pipeline, authentication.fields);

        if let Some(test) = authentication.test {
            registry.register(OperationSpec {
                name: OperationName::authentication_test(),
                kind: OperationKind::AuthenticationTest,
                noun: "Authentication".to_string(),
                display_label: "Test Authentication".to_string(),
                display_description: format!("Checks that the {name} credentials are accepted."),
                fields: FieldSchema::empty(),
                request: test.request,
                interpreter: ResponseInterpreter::ExpectStatus {
                    status: test.expect_status,
                },
            })?;
        }

        let groups = [
            (OperationKind::Trigger, triggers),
            (OperationKind::Action, actions),
            (OperationKind::Search, searches),
        ];
        for (kind, ops) in groups {
            for op in ops {
                registry.register(op.into_spec(kind))?;
            }
        }

        Ok(Self {
            name,
            version,
            registry,
        })
    }

    /// Parses a TOML definition and compiles it.
    pub fn from_toml_str(
        source: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConnectorError> {
        Self::from_definition(ConnectorDefinition::from_toml_str(source)?, transport)
    }

    pub fn name(&self) -> &ConnectorName {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Returns the declarative surface consumed by the engine's UI layer.
    pub fn describe(&self) -> ConnectorSurface<'_> {
        ConnectorSurface {
            name: &self.name,
            version: &self.version,
            authentication_fields: self.registry.credential_fields(),
            operations: self.registry.describe(),
        }
    }

    /// See [`OperationRegistry::build_request`].
    pub fn build_request(
        &self,
        operation: &str,
        bundle: &Bundle,
    ) -> Result<RequestDescriptor, ConnectorError> {
        self.registry.build_request(operation, bundle)
    }

    /// See [`OperationRegistry::execute`].
    pub async fn execute(&self, operation: &str, bundle: &Bundle) -> Result<Value, ConnectorError> {
        self.registry.execute(operation, bundle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawResponse, TransportError};
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl HttpTransport for Offline {
        async fn send(&self, _: &RequestDescriptor) -> Result<RawResponse, TransportError> {
            Err(TransportError::Connection {
                message: "offline".to_string(),
            })
        }
    }

    const MINIMAL: &str = r#"
        name = "minimal"

        [[searches]]
        name = "find_ticket"
        noun = "Ticket"
        label = "Find Ticket"
        request = { url = "https://example.com/tickets" }
    "#;

    #[test]
    fn minimal_definition_uses_defaults() {
        let definition = ConnectorDefinition::from_toml_str(MINIMAL).unwrap();
        assert_eq!(definition.version, "0.1.0");
        assert_eq!(definition.authentication.scheme, AuthScheme::None);
        assert!(definition.authentication.test.is_none());

        let search = &definition.searches[0];
        assert_eq!(search.response, ResponseInterpreter::Json);
        assert_eq!(search.request.method, crate::HttpMethod::Get);
    }

    #[test]
    fn compiled_registry_contains_search() {
        let connector = Connector::from_toml_str(MINIMAL, Arc::new(Offline)).unwrap();
        assert_eq!(connector.registry().len(), 1);
        assert_eq!(
            connector.registry().get("find_ticket").unwrap().kind,
            OperationKind::Search
        );
    }

    #[test]
    fn scheme_must_reference_declared_field() {
        let source = r#"
            name = "broken"
            [authentication]
            scheme = { type = "bearer", field = "token" }
            fields = [{ key = "api_key", required = true }]
        "#;
        let err = ConnectorDefinition::from_toml_str(source).unwrap_err();
        assert!(err.to_string().contains("undeclared credential field 'token'"));
    }

    #[test]
    fn reserved_name_is_rejected() {
        let source = r#"
            name = "broken"
            [[actions]]
            name = "authentication_test"
            noun = "X"
            label = "X"
            request = { url = "https://example.com" }
        "#;
        let err = ConnectorDefinition::from_toml_str(source).unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn duplicate_names_across_kinds_are_rejected() {
        let source = r#"
            name = "broken"
            [[triggers]]
            name = "ticket"
            noun = "Ticket"
            label = "New"
            request = { url = "https://example.com/a" }
            [[actions]]
            name = "ticket"
            noun = "Ticket"
            label = "Assign"
            request = { method = "POST", url = "https://example.com/b" }
        "#;
        let err = Connector::from_toml_str(source, Arc::new(Offline)).unwrap_err();
        assert_eq!(err.kind(), "duplicate_operation");
    }

    #[test]
    fn input_fields_require_a_body() {
        let source = r#"
            name = "broken"
            [[searches]]
            name = "find_ticket"
            noun = "Ticket"
            label = "Find Ticket"
            fields = [{ key = "subject", required = true }]
            request = { method = "POST", url = "https://example.com/tickets/search" }
        "#;
        let err = Connector::from_toml_str(source, Arc::new(Offline)).unwrap_err();
        assert_eq!(err.kind(), "invalid_definition");
        assert!(err.to_string().contains("find_ticket"));
    }

    #[test]
    fn invalid_urls_fail_to_load() {
        let source = r#"
            name = "broken"
            [[actions]]
            name = "assign_ticket"
            noun = "Ticket"
            label = "Assign"
            request = { method = "POST", url = "https://exa mple.com/x" }
        "#;
        let err = Connector::from_toml_str(source, Arc::new(Offline)).unwrap_err();
        assert_eq!(err.kind(), "invalid_definition");
    }

    #[test]
    fn toml_syntax_errors_are_definition_errors() {
        let err = ConnectorDefinition::from_toml_str("name = ").unwrap_err();
        assert_eq!(err.kind(), "invalid_definition");
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = ConnectorDefinition::from_toml_str("name = \"\"").unwrap_err();
        assert!(err.to_string().contains("ConnectorName must not be empty"));
    }

    #[tokio::test]
    async fn transport_failures_are_remote_errors() {
        let connector = Connector::from_toml_str(MINIMAL, Arc::new(Offline)).unwrap();
        let err = connector
            .execute("find_ticket", &Bundle::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert_eq!(err.origin(), crate::FailureOrigin::Remote);
    }
}
