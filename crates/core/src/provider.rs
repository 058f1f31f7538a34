//! ModelClient trait: the abstraction over the model endpoint.
//!
//! Two implementations exist: one that talks to the upstream API with a
//! credential, and one that talks to the PaperDesk relay which attaches the
//! credential server-side. The assistant never knows which one it holds.

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::message::{MessagesRequest, MessagesResponse};

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "anthropic", "relay").
    fn name(&self) -> &str;

    /// Send a request and get a complete response. No retries.
    async fn complete(&self, request: MessagesRequest) -> Result<MessagesResponse, UpstreamError>;
}
