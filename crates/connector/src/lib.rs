//! Connector execution core.
//!
//! A connector is a declarative description of authentication plus a set of
//! operations (triggers, actions, searches), each of which is a single HTTP
//! call. This crate turns such a description into an [`OperationRegistry`]
//! with a uniform `execute(operation, bundle)` entry point:
//!
//! 1. validate the [`Bundle`] against the credential and operation [`FieldSchema`]s;
//! 2. build a [`RequestDescriptor`] from the operation's [`RequestTemplate`];
//! 3. run the shared request [`Pipeline`] (default headers, credential injection);
//! 4. send it through the injected [`HttpTransport`];
//! 5. run the response pipeline (status gate) and the operation's
//!    [`ResponseInterpreter`].
//!
//! ## Architectural Layer
//!
//! **Domain + port definitions.** This crate has no I/O dependencies. The
//! network call goes through [`HttpTransport`]; the `http-transport` crate
//! supplies the reqwest implementation.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype names (`OperationName`, `FieldKey`, ...) and `InvocationId` |
//! | [`errors`] | `ConnectorError`, `TransportError`, failure classification |
//! | [`bundle`] | Per-invocation input and credentials |
//! | [`schema`] | Field specs and validation |
//! | [`request`] | Request templates and descriptors |
//! | [`response`] | Raw responses and interpreters |
//! | [`pipeline`] | Request/response stages shared by all operations |
//! | [`transport`] | The `HttpTransport` port |
//! | [`registry`] | Operation specs, the registry and `execute` |
//! | [`definition`] | TOML connector definitions and `Connector` |

pub mod bundle;
pub mod definition;
pub mod errors;
pub mod identifiers;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod response;
pub mod schema;
pub mod transport;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use bundle::Bundle;
pub use definition::{
    AuthenticationDefinition, AuthenticationTest, Connector, ConnectorDefinition,
    ConnectorSurface, OperationDefinition,
};
pub use errors::{ConnectorError, FailureOrigin, FieldScope, TransportError};
pub use identifiers::{ConnectorName, FieldKey, InvocationId, OperationName};
pub use pipeline::{AuthScheme, Pipeline, RequestStage, ResponseStage};
pub use registry::{
    InvocationState, OperationKind, OperationRegistry, OperationSpec, OperationSurface,
};
pub use request::{BodyTemplate, HttpMethod, RequestDescriptor, RequestTemplate};
pub use response::{RawResponse, ResponseInterpreter};
pub use schema::{FieldSchema, FieldSpec, FieldType};
pub use transport::HttpTransport;
