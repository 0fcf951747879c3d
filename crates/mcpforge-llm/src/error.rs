//! LLM backend error types (§4.9, §4.10).
//!
//! Kept separate from [`mcpforge_core::McpForgeError`]: these are failures
//! of the HTTP round-trip to the model provider, one level below the
//! execution loop, which converts them into user-visible warning strings
//! rather than propagating them (§7 "returned as a user-visible warning
//! string rather than thrown").

use thiserror::Error;

/// Errors that can occur building or driving an LLM backend client.
#[derive(Debug, Error)]
pub enum LlmError {
    /// `getClient`/`testConfiguration` invoked without an API key.
    #[error("API key not configured")]
    ApiKeyMissing,

    /// The provider's HTTP endpoint returned a non-success status.
    #[error("API request failed: {0}")]
    ApiRequestFailed(String),

    /// The response body did not match the shape this backend expects.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias for LLM backend operations.
pub type LlmResult<T> = Result<T, LlmError>;
