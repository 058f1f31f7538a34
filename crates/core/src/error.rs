//! Error types for the PaperDesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Upstream and extraction failures get their own enums so callers can
//! tell an HTTP status from a malformed body or an empty extraction.

use thiserror::Error;

/// The top-level error type for all PaperDesk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // --- External service errors ---
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    // --- Sequencing ---
    #[error("Busy: {0}")]
    Busy(String),

    #[error("Result discarded: the session was reset while the request was in flight")]
    Superseded,

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failure talking to the model endpoint (directly or through the relay).
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Non-2xx answer. `body` is the upstream body (or the relay's `error` text).
    #[error("API request failed with status {status_code}: {body}")]
    Status { status_code: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl UpstreamError {
    /// The HTTP status to report for this failure, if there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("no text in response")]
    EmptyResult,
}
