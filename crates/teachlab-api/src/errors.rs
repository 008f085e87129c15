//! API error types.

/// Errors from the request/response surface.
///
/// Every call site defines its own fallback (e.g. voice input falls back to a
/// partial transcript); none of these desynchronize the session store.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network-level failure (connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the server.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, surfaced for diagnostics.
        message: String,
    },
}

/// Convenience alias for API results.
pub type Result<T> = std::result::Result<T, ApiError>;
