//! Chat session controller: owns the conversation log and drives the consumer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zepchat_contracts::{ChatRequest, ChatSettings};

use crate::consumer::StreamConsumer;
use crate::error::StreamError;
use crate::transport::RequestDescriptor;

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation log. Never modified once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    /// Set on assistant turns that describe a failed request.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            failed: false,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            failed: false,
            created_at: Utc::now(),
        }
    }

    /// Assistant turn telling the user why there is no answer.
    pub fn failure(error: &StreamError) -> Self {
        Self {
            role: Role::Assistant,
            content: format!("⚠ {}", describe_failure(error)),
            failed: true,
            created_at: Utc::now(),
        }
    }
}

fn describe_failure(error: &StreamError) -> String {
    match error {
        StreamError::ConcurrentRequest => {
            "Another answer is still being generated. Please wait and try again.".to_string()
        }
        StreamError::Transport {
            status: Some(status),
            message,
        } => format!("The answer failed (server returned {status}: {message})."),
        StreamError::Transport {
            status: None,
            message,
        } => format!("Could not reach the chat server ({message})."),
        StreamError::Decode(_) => {
            "The answer could not be read because the response was corrupted.".to_string()
        }
        StreamError::InvalidRequest(message) => {
            format!("The question could not be sent ({message}).")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    Busy,
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Ignored(IgnoreReason),
    Answered(ChatTurn),
    Failed { turn: ChatTurn, error: StreamError },
}

/// One conversation against the chat endpoint.
pub struct ChatSession {
    id: Uuid,
    consumer: Arc<StreamConsumer>,
    endpoint: String,
    settings: ChatSettings,
    headers: Vec<(String, String)>,
    history: RwLock<Vec<ChatTurn>>,
    phase: Mutex<Phase>,
}

impl ChatSession {
    pub fn new(consumer: Arc<StreamConsumer>, endpoint: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            consumer,
            endpoint: endpoint.into(),
            settings: ChatSettings::default(),
            headers: Vec::new(),
            history: RwLock::new(Vec::new()),
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn with_settings(mut self, settings: ChatSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Extra header sent with every request (e.g. authorization).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> ChatSettings {
        self.settings
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    pub fn history(&self) -> Vec<ChatTurn> {
        self.history.read().clone()
    }

    /// The consumer whose state mirrors the answer being streamed.
    pub fn consumer(&self) -> &Arc<StreamConsumer> {
        &self.consumer
    }

    /// Ask `text` and wait for the answer.
    ///
    /// The user turn is logged right away. The assistant turn, successful or
    /// not, is logged only after the stream settles. Submissions made while
    /// waiting for an answer are ignored.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let question = text.trim();
        if question.is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        let Some(_awaiting) = self.begin_turn() else {
            debug!(session_id = %self.id, "Ignoring submission while awaiting a response");
            return SubmitOutcome::Ignored(IgnoreReason::Busy);
        };

        self.append(ChatTurn::user(question));
        info!(session_id = %self.id, turns = self.history.read().len(), "Submitting question");

        let result = match self.descriptor(question) {
            Ok(descriptor) => self.consumer.request(descriptor).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(answer) => {
                let turn = ChatTurn::assistant(answer);
                self.append(turn.clone());
                SubmitOutcome::Answered(turn)
            }
            Err(error) => {
                warn!(session_id = %self.id, error = %error, "Question failed");
                let turn = ChatTurn::failure(&error);
                self.append(turn.clone());
                SubmitOutcome::Failed { turn, error }
            }
        }
    }

    fn descriptor(&self, question: &str) -> Result<RequestDescriptor, StreamError> {
        let body = ChatRequest::new(question).with_settings(self.settings);
        let descriptor = RequestDescriptor::post_json(&self.endpoint, &body)?;
        Ok(self
            .headers
            .iter()
            .fold(descriptor, |descriptor, (name, value)| {
                descriptor.with_header(name.clone(), value.clone())
            }))
    }

    fn begin_turn(&self) -> Option<Awaiting<'_>> {
        let mut phase = self.phase.lock();
        if *phase == Phase::AwaitingResponse {
            return None;
        }
        *phase = Phase::AwaitingResponse;
        Some(Awaiting { session: self })
    }

    fn append(&self, turn: ChatTurn) {
        self.history.write().push(turn);
    }
}

/// Returns the session to `Idle` when the turn ends, however it ends.
struct Awaiting<'a> {
    session: &'a ChatSession,
}

impl Drop for Awaiting<'_> {
    fn drop(&mut self) {
        *self.session.phase.lock() = Phase::Idle;
    }
}
