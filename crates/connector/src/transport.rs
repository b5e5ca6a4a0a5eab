//! Port for the network collaborator.
//!
//! The core never performs I/O itself. Infrastructure crates implement
//! [`HttpTransport`] and the registry calls it exactly once per valid
//! invocation. Timeouts, cancellation and connection reuse are the
//! implementation's business.

use async_trait::async_trait;

use crate::{RawResponse, RequestDescriptor, TransportError};

/// Executes a built request and returns the raw response.
///
/// Implementations must return every response they receive, including error
/// statuses, as `Ok(RawResponse)`. `Err` is reserved for the case where no
/// response was obtained.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends `request` and returns the response status and body.
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError>;
}
