//! Model endpoint clients for PaperDesk.
//!
//! All clients implement the `paperdesk_core::ModelClient` trait.
//! [`build_client`] picks the relay when one is configured, otherwise the
//! direct upstream client, which needs a local API key.

pub mod anthropic;
pub mod relay_client;

pub use anthropic::AnthropicClient;
pub use relay_client::RelayClient;

use std::sync::Arc;
use std::time::Duration;

use paperdesk_config::AppConfig;
use paperdesk_core::error::UpstreamError;
use paperdesk_core::message::MessagesResponse;
use paperdesk_core::ModelClient;
use tracing::info;

/// Build the client the assistant should use for this configuration.
pub fn build_client(config: &AppConfig) -> Result<Arc<dyn ModelClient>, UpstreamError> {
    let timeout = (config.upstream.timeout_secs > 0)
        .then(|| Duration::from_secs(config.upstream.timeout_secs));

    if let Some(url) = &config.client.relay_url {
        info!(relay = %url, "Using relay client");
        return Ok(Arc::new(RelayClient::new(url, timeout)?));
    }

    match &config.api_key {
        Some(key) => {
            info!(base_url = %config.upstream.base_url, "Using direct Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(key, &config.upstream)?))
        }
        None => Err(UpstreamError::NotConfigured(format!(
            "set {} or client.relay_url / PAPERDESK_RELAY_URL",
            paperdesk_config::API_KEY_ENV
        ))),
    }
}

/// Interpret a JSON body as a messages response.
///
/// A body carrying `error` (the shape the relay and some proxies use) is a
/// failure even when it arrived with a 2xx status.
pub(crate) fn parse_messages_response(value: serde_json::Value) -> Result<MessagesResponse, UpstreamError> {
    if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
        return Err(UpstreamError::Malformed(format!(
            "upstream reported an error: {}",
            error_text(err)
        )));
    }
    serde_json::from_value(value)
        .map_err(|e| UpstreamError::Malformed(format!("unexpected response shape: {e}")))
}

/// Human-readable text of an `error` field: a string, or an object with `message`.
pub(crate) fn error_text(err: &serde_json::Value) -> String {
    match err {
        serde_json::Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}
