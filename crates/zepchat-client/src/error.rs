//! Error types for the client

use thiserror::Error;

use crate::decode::DecodeError;

/// Ways a streamed request can fail. None of them are retried internally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// `request` was called while a previous request was still in flight.
    #[error("a request is already in flight")]
    ConcurrentRequest,

    /// Network failure or non-success HTTP status.
    #[error("{}", transport_message(.status, .message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A chunk was not valid UTF-8.
    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),

    /// The request descriptor could not be built (e.g. body serialization).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn transport_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("transport error (HTTP {status}): {message}"),
        None => format!("transport error: {message}"),
    }
}

impl StreamError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by a transport error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport {
            status: error.status().map(|status| status.as_u16()),
            message: error.to_string(),
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display() {
        let with_status = StreamError::transport(Some(502), "upstream failed");
        assert_eq!(
            with_status.to_string(),
            "transport error (HTTP 502): upstream failed"
        );
        assert_eq!(with_status.status(), Some(502));

        let without = StreamError::transport(None, "connection reset");
        assert_eq!(without.to_string(), "transport error: connection reset");
        assert_eq!(without.status(), None);
    }
}
