//! Errors from a single LLM completion attempt

use thiserror::Error;

/// Failure of one completion call; the caller decides whether to retry
#[derive(Debug, Error)]
pub enum LlmError {
    /// Any non-2xx answer, 429 included; the body is kept verbatim
    #[error("LLM API returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("network error talking to the LLM: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unusable LLM response: {0}")]
    InvalidResponse(String),

    #[error("LLM configuration error: {0}")]
    Config(String),

    #[error("malformed LLM response body: {0}")]
    Json(#[from] serde_json::Error),
}
