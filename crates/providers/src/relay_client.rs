//! Client for the PaperDesk relay (`POST /api/analyze`).
//!
//! Carries no credential: the relay attaches it server-side. Failures come
//! back as `{ "error": "..." }` with the upstream status, or 500.

use std::time::Duration;

use async_trait::async_trait;
use paperdesk_core::error::UpstreamError;
use paperdesk_core::message::{MessagesRequest, MessagesResponse};
use tracing::debug;

use crate::anthropic::map_transport_error;
use crate::{error_text, parse_messages_response};

pub struct RelayClient {
    base_url: String,
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| UpstreamError::NotConfigured(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/analyze", self.base_url)
    }
}

#[async_trait]
impl paperdesk_core::ModelClient for RelayClient {
    fn name(&self) -> &str {
        "relay"
    }

    async fn complete(&self, request: MessagesRequest) -> Result<MessagesResponse, UpstreamError> {
        debug!(client = "relay", endpoint = %self.endpoint(), model = %request.model, "Sending request via relay");

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            let body = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("error").map(error_text))
                .unwrap_or(text);
            return Err(UpstreamError::Status {
                status_code: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| UpstreamError::Malformed(format!("relay returned invalid JSON: {e}")))?;
        parse_messages_response(value)
    }
}
