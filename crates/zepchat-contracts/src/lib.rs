//! Wire contracts for the ZepChat chat endpoint.
//!
//! The client posts a [`ChatRequest`] as JSON and receives either a streamed
//! `text/plain` answer or a non-2xx response carrying an [`ErrorBody`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path of the streaming chat endpoint.
pub const CHAT_PATH: &str = "/api/chat";

pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_RELATEDNESS: f32 = 0.75;

/// Generation and retrieval knobs sent with every question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Minimum similarity score a retrieved document needs to be used as context.
    #[serde(default = "default_relatedness")]
    pub relatedness: f32,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_relatedness() -> f32 {
    DEFAULT_RELATEDNESS
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            relatedness: DEFAULT_RELATEDNESS,
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub settings: ChatSettings,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            settings: ChatSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ChatSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Check the request before any retrieval or generation happens.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.question.trim().is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }

        let temperature = self.settings.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ValidationError::Temperature(temperature));
        }

        let relatedness = self.settings.relatedness;
        if !(0.0..=1.0).contains(&relatedness) {
            return Err(ValidationError::Relatedness(relatedness));
        }

        Ok(())
    }
}

/// Reasons a [`ChatRequest`] is rejected with `400 Bad Request`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("temperature must be between 0 and 2, got {0}")]
    Temperature(f32),

    #[error("relatedness must be between 0 and 1, got {0}")]
    Relatedness(f32),
}

/// JSON body of every non-2xx response from the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
