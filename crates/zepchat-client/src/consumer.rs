//! Stream consumer: turns a token-streamed HTTP response into observable state.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zepchat_contracts::ErrorBody;

use crate::decode::Utf8StreamDecoder;
use crate::error::{Result, StreamError};
use crate::observable::{Observable, Subscription};
use crate::state::StreamState;
use crate::transport::{HttpTransport, RequestDescriptor, Transport, TransportResponse};

/// Error bodies longer than this are truncated before being surfaced.
const MAX_ERROR_BODY: usize = 512;

/// Reading a non-2xx body stops after this many bytes.
const MAX_ERROR_READ: usize = 4 * 1024;

/// Owns one [`StreamState`] and drives at most one request at a time.
pub struct StreamConsumer {
    transport: Arc<dyn Transport>,
    state: Observable<StreamState>,
    in_flight: AtomicBool,
}

impl StreamConsumer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Observable::new(StreamState::idle()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Consumer backed by a plain [`HttpTransport`].
    pub fn http() -> Self {
        Self::new(Arc::new(HttpTransport::new()))
    }

    pub fn state(&self) -> StreamState {
        self.state.get()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Observe every published state, starting with the current one.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StreamState) + Send + Sync + 'static,
    {
        self.state.subscribe(callback)
    }

    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<StreamState> {
        self.state.subscribe_channel()
    }

    /// Issue `descriptor` and accumulate its streamed body.
    ///
    /// The request starts when this is called, not when the future is first
    /// polled: the in-flight slot is claimed and `{loading: true, text: ""}`
    /// is published before returning. A call made while another request is
    /// in flight resolves to [`StreamError::ConcurrentRequest`] and leaves the
    /// state untouched.
    ///
    /// Dropping the future cancels the request; `loading` goes back to false
    /// and the consumer accepts new requests.
    pub fn request(
        &self,
        descriptor: RequestDescriptor,
    ) -> impl Future<Output = Result<String>> + Send + '_ {
        let started = self.begin();

        async move {
            let guard = started?;
            let request_id = guard.request_id;
            let result = self.receive(descriptor, request_id).await;
            drop(guard);

            match &result {
                Ok(text) => info!(%request_id, bytes = text.len(), "Stream completed"),
                Err(e) => warn!(%request_id, error = %e, "Stream failed"),
            }
            result
        }
    }

    fn begin(&self) -> Result<InFlight<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rejected request while another is in flight");
            return Err(StreamError::ConcurrentRequest);
        }

        self.state.publish(StreamState::new(true, ""));
        Ok(InFlight {
            consumer: self,
            request_id: Uuid::new_v4(),
        })
    }

    async fn receive(&self, descriptor: RequestDescriptor, request_id: Uuid) -> Result<String> {
        debug!(%request_id, method = %descriptor.method, url = %descriptor.url, "Sending request");

        let response = self.transport.send(descriptor).await?;
        if !response.is_success() {
            return Err(error_from_response(response).await);
        }

        let status = response.status;
        let mut body = response.body;
        let mut decoder = Utf8StreamDecoder::new();
        let mut chunks = 0usize;

        while let Some(chunk) = body.next().await {
            let bytes = chunk.map_err(|message| StreamError::transport(Some(status), message))?;
            chunks += 1;

            let text = decoder.push(&bytes)?;
            debug!(%request_id, chunk = chunks, bytes = bytes.len(), "Received chunk");
            if text.is_empty() {
                continue;
            }
            self.state.update(|state| state.text.push_str(&text));
        }

        decoder.finish()?;
        Ok(self.state.get().text)
    }
}

/// Marks the consumer busy for as long as it lives.
struct InFlight<'a> {
    consumer: &'a StreamConsumer,
    request_id: Uuid,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // Observers of the settled state may start the next request.
        self.consumer.in_flight.store(false, Ordering::Release);
        self.consumer.state.update(|state| state.loading = false);
    }
}

async fn error_from_response(response: TransportResponse) -> StreamError {
    let status = response.status;
    let mut body = response.body;
    let mut raw = Vec::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => raw.extend_from_slice(&bytes),
            Err(e) => {
                debug!(status, error = %e, "Failed to read error body");
                break;
            }
        }
        if raw.len() >= MAX_ERROR_READ {
            debug!(status, read = raw.len(), "Error body too long, stopped reading");
            raw.truncate(MAX_ERROR_READ);
            break;
        }
    }

    let message = match serde_json::from_slice::<ErrorBody>(&raw) {
        Ok(body) => body.error,
        Err(_) if raw.is_empty() => format!("HTTP {status}"),
        Err(_) => truncate(&String::from_utf8_lossy(&raw)),
    };

    StreamError::transport(Some(status), message)
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &body[..end])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::decode::DecodeError;
    use crate::transport::{Gate, ScriptedResponse, ScriptedTransport};

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::post_json("http://chat.test/api/chat", &serde_json::json!({"question": "hi"}))
            .unwrap()
    }

    fn consumer_with(responses: Vec<ScriptedResponse>) -> StreamConsumer {
        StreamConsumer::new(Arc::new(ScriptedTransport::new(responses)))
    }

    fn record(consumer: &StreamConsumer) -> (Arc<Mutex<Vec<StreamState>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = consumer.subscribe(move |state| sink.lock().push(state.clone()));
        (seen, sub)
    }

    #[tokio::test]
    async fn test_hello_scenario_publishes_every_prefix() {
        let consumer = consumer_with(vec![ScriptedResponse::chunks(["Hel", "lo", "!"])]);
        let (seen, _sub) = record(&consumer);

        let text = consumer.request(descriptor()).await.unwrap();
        assert_eq!(text, "Hello!");

        // First entry is the replay of the idle state on subscribe.
        assert_eq!(
            *seen.lock(),
            vec![
                StreamState::new(false, ""),
                StreamState::new(true, ""),
                StreamState::new(true, "Hel"),
                StreamState::new(true, "Hello"),
                StreamState::new(true, "Hello!"),
                StreamState::new(false, "Hello!"),
            ]
        );
        assert!(!consumer.is_busy());
    }

    #[tokio::test]
    async fn test_resolved_value_is_concatenation() {
        let chunks = ["The ", "quick ", "brown ", "", "fox", " 🦊"];
        let consumer = consumer_with(vec![ScriptedResponse::chunks(chunks)]);

        let text = consumer.request(descriptor()).await.unwrap();
        assert_eq!(text, chunks.concat());
        assert_eq!(consumer.state(), StreamState::new(false, chunks.concat()));
    }

    #[test]
    fn test_loading_is_set_before_first_poll() {
        let gate = Gate::new();
        let consumer = consumer_with(vec![ScriptedResponse::chunks(["x"]).then_wait(&gate)]);

        let pending = consumer.request(descriptor());
        assert_eq!(consumer.state(), StreamState::new(true, ""));
        assert!(consumer.is_busy());

        drop(pending);
        assert_eq!(consumer.state(), StreamState::new(false, ""));
        assert!(!consumer.is_busy());
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_current_prefix() {
        let gate = Gate::new();
        let consumer = consumer_with(vec![
            ScriptedResponse::chunks(["a", "b"])
                .then_wait(&gate)
                .then_chunk("c"),
        ]);
        let mut updates = consumer.subscribe_channel();

        let request = consumer.request(descriptor());
        let observer = async {
            while let Some(state) = updates.recv().await {
                if state.text == "ab" {
                    break;
                }
            }
            let (late, _sub) = record(&consumer);
            assert_eq!(*late.lock(), vec![StreamState::new(true, "ab")]);
            gate.release();
        };

        let (result, ()) = tokio::join!(request, observer);
        assert_eq!(result.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_failure_after_chunks_keeps_partial_text() {
        let consumer = consumer_with(vec![
            ScriptedResponse::chunks(["c1", "c2"]).then_fail("connection reset"),
        ]);
        let (seen, _sub) = record(&consumer);

        let error = consumer.request(descriptor()).await.unwrap_err();
        assert_eq!(
            error,
            StreamError::transport(Some(200), "connection reset")
        );
        assert_eq!(seen.lock().last(), Some(&StreamState::new(false, "c1c2")));
    }

    #[tokio::test]
    async fn test_concurrent_request_is_rejected() {
        let gate = Gate::new();
        let consumer = consumer_with(vec![
            ScriptedResponse::chunks(["Hel"]).then_wait(&gate).then_chunk("lo"),
            ScriptedResponse::chunks(["never"]),
        ]);
        let mut updates = consumer.subscribe_channel();

        let first = consumer.request(descriptor());
        let second = async {
            while let Some(state) = updates.recv().await {
                if state.text == "Hel" {
                    break;
                }
            }
            let rejected = consumer.request(descriptor()).await;
            assert_eq!(consumer.state(), StreamState::new(true, "Hel"));
            gate.release();
            rejected
        };

        let (first, second) = tokio::join!(first, second);
        assert_eq!(second, Err(StreamError::ConcurrentRequest));
        assert_eq!(first.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_next_request_resets_text() {
        let consumer = consumer_with(vec![
            ScriptedResponse::chunks(["first"]),
            ScriptedResponse::chunks(["second"]),
        ]);

        consumer.request(descriptor()).await.unwrap();
        assert_eq!(consumer.state(), StreamState::new(false, "first"));

        let (seen, _sub) = record(&consumer);
        consumer.request(descriptor()).await.unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                StreamState::new(false, "first"),
                StreamState::new(true, ""),
                StreamState::new(true, "second"),
                StreamState::new(false, "second"),
            ]
        );
    }

    #[tokio::test]
    async fn test_error_status_uses_json_error_field() {
        let consumer = consumer_with(vec![ScriptedResponse::status(
            502,
            r#"{"error":"language model unavailable"}"#,
        )]);

        let error = consumer.request(descriptor()).await.unwrap_err();
        assert_eq!(
            error,
            StreamError::transport(Some(502), "language model unavailable")
        );
        assert_eq!(consumer.state(), StreamState::new(false, ""));
    }

    #[tokio::test]
    async fn test_error_status_with_plain_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY + 10);
        let consumer = consumer_with(vec![ScriptedResponse::status(500, body)]);

        let error = consumer.request(descriptor()).await.unwrap_err();
        let StreamError::Transport { status, message } = error else {
            panic!("expected transport error");
        };
        assert_eq!(status, Some(500));
        assert!(message.ends_with("... [truncated]"));
        assert_eq!(message.len(), MAX_ERROR_BODY + "... [truncated]".len());
    }

    #[tokio::test]
    async fn test_connect_error_is_transport_error() {
        let consumer = consumer_with(vec![ScriptedResponse::connect_error("dns failure")]);

        let error = consumer.request(descriptor()).await.unwrap_err();
        assert_eq!(error, StreamError::transport(None, "dns failure"));
        assert!(!consumer.state().loading);
    }

    #[tokio::test]
    async fn test_invalid_utf8_fails_stream() {
        let consumer = consumer_with(vec![
            ScriptedResponse::chunks(["ok "]).then_bytes(vec![0xff, 0xfe]),
        ]);

        let error = consumer.request(descriptor()).await.unwrap_err();
        assert_eq!(
            error,
            StreamError::Decode(DecodeError::InvalidUtf8 { offset: 3 })
        );
        assert_eq!(consumer.state(), StreamState::new(false, "ok "));
    }

    #[tokio::test]
    async fn test_split_character_is_published_once_complete() {
        let crab = "🦀".as_bytes().to_vec();
        let consumer = consumer_with(vec![
            ScriptedResponse::chunks(["hi "])
                .then_bytes(crab[..2].to_vec())
                .then_bytes(crab[2..].to_vec()),
        ]);
        let (seen, _sub) = record(&consumer);

        assert_eq!(consumer.request(descriptor()).await.unwrap(), "hi 🦀");
        let texts: Vec<String> = seen.lock().iter().map(|s| s.text.clone()).collect();
        assert_eq!(texts, vec!["", "", "hi ", "hi 🦀", "hi 🦀"]);
    }

    #[tokio::test]
    async fn test_caller_timeout_releases_consumer() {
        let gate = Gate::new();
        let consumer = consumer_with(vec![
            ScriptedResponse::chunks(["slow"]).then_wait(&gate),
            ScriptedResponse::chunks(["fast"]),
        ]);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), consumer.request(descriptor())).await;
        assert!(timed_out.is_err());
        assert_eq!(consumer.state(), StreamState::new(false, "slow"));

        assert_eq!(consumer.request(descriptor()).await.unwrap(), "fast");
    }

    #[tokio::test]
    async fn test_endless_error_body_is_bounded() {
        let gate = Gate::new();
        let mut response = ScriptedResponse::status(503, "y".repeat(1024));
        for _ in 0..8 {
            response = response.then_chunk("y".repeat(1024));
        }
        // Never released: the body does not end on its own.
        let consumer = consumer_with(vec![response.then_wait(&gate)]);

        let error = tokio::time::timeout(Duration::from_secs(5), consumer.request(descriptor()))
            .await
            .expect("request should settle without reading the whole body")
            .unwrap_err();
        let StreamError::Transport { status, message } = error else {
            panic!("expected transport error");
        };
        assert_eq!(status, Some(503));
        assert_eq!(message.len(), MAX_ERROR_BODY + "... [truncated]".len());
        assert!(!consumer.is_busy());
    }

    #[tokio::test]
    async fn test_settle_observer_can_start_next_request() {
        let consumer = Arc::new(consumer_with(vec![ScriptedResponse::chunks(["done"])]));
        let armed = Arc::new(AtomicBool::new(true));
        let observed = Arc::new(Mutex::new(None));

        let observer = consumer.clone();
        let sink = observed.clone();
        let _sub = consumer.subscribe(move |state| {
            if state.loading || state.text.is_empty() || !armed.swap(false, Ordering::AcqRel) {
                return;
            }
            let busy_at_settle = observer.is_busy();
            let next = observer.request(descriptor());
            let started = observer.state().loading;
            drop(next);
            *sink.lock() = Some((busy_at_settle, started));
        });

        assert_eq!(consumer.request(descriptor()).await.unwrap(), "done");
        assert_eq!(*observed.lock(), Some((false, true)));
        assert!(!consumer.is_busy());
    }
}
