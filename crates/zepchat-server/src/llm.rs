//! OpenAI-compatible streaming chat completions.

use std::fmt::Display;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::LlmConfig;
use crate::error::{Result, ServerError, response_to_error};

/// Answer tokens in generation order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamErrorPayload>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamErrorPayload {
    message: String,
}

/// OpenAI client
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(client: Client, config: &LlmConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Start a streamed completion. Errors before the first token (connection,
    /// non-success status) are returned here; later ones come through the stream.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<TokenStream> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_to_error(response, "OpenAI").await);
        }

        Ok(Box::pin(sse_content(response.bytes_stream())))
    }
}

/// Extract content deltas from an SSE `data:` event stream.
pub fn sse_content<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(ServerError::Llm(format!("Stream error: {}", e)));
                    return;
                }
            };
            // JSON never carries a raw CR, so dropping them normalizes CRLF framing.
            buffer.extend(chunk.as_ref().iter().copied().filter(|b| *b != b'\r'));

            while let Some(pos) = find_event_end(&buffer) {
                let event: Vec<u8> = buffer.drain(..pos + 2).collect();
                match parse_event(&event[..pos]) {
                    Event::Done => return,
                    Event::Tokens(tokens) => {
                        for token in tokens {
                            yield Ok(token);
                        }
                    }
                    Event::Error(message) => {
                        yield Err(ServerError::Llm(message));
                        return;
                    }
                }
            }
        }

        // The last event may lack its trailing blank line.
        if !buffer.is_empty() {
            match parse_event(&buffer) {
                Event::Tokens(tokens) => {
                    for token in tokens {
                        yield Ok(token);
                    }
                }
                Event::Error(message) => yield Err(ServerError::Llm(message)),
                Event::Done => {}
            }
        }
    }
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

enum Event {
    Tokens(Vec<String>),
    Error(String),
    Done,
}

fn parse_event(raw: &[u8]) -> Event {
    let text = String::from_utf8_lossy(raw);
    let mut tokens = Vec::new();

    for line in text.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return Event::Done;
        }

        let parsed: StreamResponse = match serde_json::from_str(data) {
            Ok(parsed) => parsed,
            Err(e) => {
                let preview: String = data.chars().take(120).collect();
                warn!(error = %e, data = %preview, "Skipping unparseable SSE data line");
                continue;
            }
        };
        if let Some(error) = parsed.error {
            return Event::Error(error.message);
        }
        tokens.extend(
            parsed
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .filter(|content| !content.is_empty()),
        );
    }

    Event::Tokens(tokens)
}
