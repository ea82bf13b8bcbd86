//! Deterministic in-memory transport for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{RequestDescriptor, Transport, TransportResponse};
use crate::error::{Result, StreamError};

/// Holds a scripted body open until released.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    notify: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the waiting stream continue. Releasing before the stream reaches
    /// the gate is fine; the permit is kept.
    pub fn release(&self) {
        self.notify.notify_one();
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// One step of a scripted response body.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver these bytes as one chunk.
    Chunk(Bytes),
    /// Fail the body with a transport error.
    Fail(String),
    /// Pause until the gate is released.
    Wait(Gate),
}

/// A canned response.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    status: u16,
    steps: Vec<ScriptStep>,
    connect_error: Option<String>,
}

impl ScriptedResponse {
    /// `200 OK` delivering `chunks` one by one.
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            status: 200,
            steps: chunks
                .into_iter()
                .map(|chunk| ScriptStep::Chunk(Bytes::copy_from_slice(chunk.as_ref().as_bytes())))
                .collect(),
            connect_error: None,
        }
    }

    /// Non-success status with a single-chunk body.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            steps: vec![ScriptStep::Chunk(Bytes::from(body.into()))],
            connect_error: None,
        }
    }

    /// The request never reaches a server.
    pub fn connect_error(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            steps: Vec::new(),
            connect_error: Some(message.into()),
        }
    }

    pub fn then_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.steps.push(ScriptStep::Chunk(bytes.into()));
        self
    }

    pub fn then_chunk(self, chunk: impl AsRef<str>) -> Self {
        self.then_bytes(Bytes::copy_from_slice(chunk.as_ref().as_bytes()))
    }

    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Fail(message.into()));
        self
    }

    pub fn then_wait(mut self, gate: &Gate) -> Self {
        self.steps.push(ScriptStep::Wait(gate.clone()));
        self
    }
}

/// Replays scripted responses in order and records every request it sees.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    requests: Arc<Mutex<Vec<RequestDescriptor>>>,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.responses.lock().push_back(response);
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse> {
        self.requests.lock().push(request);

        let response = self
            .responses
            .lock()
            .pop_front()
            .ok_or_else(|| StreamError::transport(None, "no scripted response left"))?;

        if let Some(message) = response.connect_error {
            return Err(StreamError::transport(None, message));
        }

        let steps = response.steps;
        let body = stream! {
            for step in steps {
                match step {
                    ScriptStep::Chunk(bytes) => yield Ok(bytes),
                    ScriptStep::Fail(message) => {
                        yield Err(message);
                        return;
                    }
                    ScriptStep::Wait(gate) => gate.wait().await,
                }
            }
        };

        Ok(TransportResponse {
            status: response.status,
            body: Box::pin(body),
        })
    }
}
