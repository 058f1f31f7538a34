//! `POST /api/analyze`: forward a messages request with the server-held key.
//!
//! The body is passed through as-is apart from filling in `model` and
//! `max_tokens` defaults. The upstream answer is returned verbatim on
//! success, and failures are reported as `{ "error": "..." }`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use paperdesk_core::error::UpstreamError;
use paperdesk_providers::AnthropicClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

pub const KEY_MISSING_MESSAGE: &str =
    "ANTHROPIC_API_KEY not configured. Please set your API key in the .env file.";

/// Shared, immutable relay state.
pub struct RelayState {
    /// `None` when no credential is configured; every request then fails.
    pub upstream: Option<Arc<AnthropicClient>>,
    pub default_model: String,
    pub default_max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub messages: Option<serde_json::Value>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayError {
    pub error: String,
}

fn relay_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(RelayError { error: message.into() })).into_response()
}

pub async fn analyze_handler(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Rejected relay body");
            return relay_error(rejection.status(), rejection.body_text());
        }
    };

    let Some(upstream) = state.upstream.as_ref() else {
        warn!("Relay request received but no API key is configured");
        return relay_error(StatusCode::INTERNAL_SERVER_ERROR, KEY_MISSING_MESSAGE);
    };

    let mut body = serde_json::json!({
        "model": request.model.unwrap_or_else(|| state.default_model.clone()),
        "max_tokens": request.max_tokens.unwrap_or(state.default_max_tokens),
    });
    if let Some(messages) = request.messages {
        body["messages"] = messages;
    }

    match upstream.forward(&body).await {
        Ok(value) => Json(value).into_response(),
        Err(UpstreamError::Status { status_code, body }) => {
            error!(status = status_code, "Anthropic API error");
            let status = StatusCode::from_u16(status_code).unwrap_or(StatusCode::BAD_GATEWAY);
            relay_error(status, format!("Anthropic API error: {status_code} - {body}"))
        }
        Err(e) => {
            error!(error = %e, "Relay error");
            relay_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}
