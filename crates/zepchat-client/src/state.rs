use serde::{Deserialize, Serialize};

/// Snapshot published by the stream consumer.
///
/// `text` only grows while a request is in flight and is reset to empty when
/// the next request starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    pub loading: bool,
    pub text: String,
}

impl StreamState {
    pub fn new(loading: bool, text: impl Into<String>) -> Self {
        Self {
            loading,
            text: text.into(),
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }
}
