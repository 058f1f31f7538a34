//! Anthropic Messages API client.
//!
//! Holds the credential. Used directly by the assistant when an API key is
//! configured locally, and by the relay to forward browser requests.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - No retries; one request in, one response or error out

use std::time::Duration;

use async_trait::async_trait;
use paperdesk_config::UpstreamConfig;
use paperdesk_core::error::UpstreamError;
use paperdesk_core::message::{MessagesRequest, MessagesResponse};
use tracing::{debug, warn};

use crate::parse_messages_response;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic native Messages API client.
pub struct AnthropicClient {
    name: String,
    base_url: String,
    api_key: String,
    version: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Create a new client. `timeout` of `None` waits indefinitely.
    pub fn new(api_key: impl Into<String>, timeout: Option<Duration>) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| UpstreamError::NotConfigured(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            version: ANTHROPIC_VERSION.into(),
            client,
        })
    }

    /// Create from the `[upstream]` configuration section.
    pub fn from_config(api_key: impl Into<String>, config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        Ok(Self::new(api_key, timeout)?
            .with_base_url(&config.base_url)
            .with_version(&config.anthropic_version))
    }

    /// Use a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a fully formed body to `/v1/messages` and return the JSON answer.
    ///
    /// The body is not inspected or reshaped. Non-2xx answers become
    /// [`UpstreamError::Status`] carrying the upstream status and raw body.
    pub async fn forward(&self, body: &serde_json::Value) -> Result<serde_json::Value, UpstreamError> {
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Anthropic API error");
            return Err(UpstreamError::Status {
                status_code: status.as_u16(),
                body: error_body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| UpstreamError::Malformed(format!("Failed to parse Anthropic response: {e}")))
    }
}

pub(crate) fn map_transport_error(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout(e.to_string())
    } else {
        UpstreamError::Network(e.to_string())
    }
}

#[async_trait]
impl paperdesk_core::ModelClient for AnthropicClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: MessagesRequest) -> Result<MessagesResponse, UpstreamError> {
        debug!(
            client = "anthropic",
            model = %request.model,
            max_tokens = request.max_tokens,
            "Sending completion request"
        );
        let body = serde_json::to_value(&request)
            .map_err(|e| UpstreamError::Malformed(format!("unserializable request: {e}")))?;
        let value = self.forward(&body).await?;
        parse_messages_response(value)
    }
}
