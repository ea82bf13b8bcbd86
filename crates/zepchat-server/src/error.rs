//! Error types for the chat server

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    /// An upstream API (Zep or the language model) answered with a non-success status.
    #[error("{provider} returned HTTP {status}: {message}")]
    UpstreamHttp {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Longest upstream error body echoed back to clients.
const MAX_ERROR_BODY: usize = 512;

pub(crate) async fn response_to_error(
    response: reqwest::Response,
    provider: &'static str,
) -> ServerError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &body[..end])
    } else {
        body
    };

    ServerError::UpstreamHttp {
        provider,
        status,
        message,
    }
}
