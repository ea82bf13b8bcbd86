//! Transport seam between the stream consumer and the network.

mod http;
#[cfg(any(test, feature = "test-utils"))]
mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::Method;
use serde::Serialize;

use crate::error::{Result, StreamError};

pub use http::{DISABLE_SYSTEM_PROXY_ENV, HttpTransport, build_http_client, direct_http_client};
#[cfg(any(test, feature = "test-utils"))]
pub use scripted::{Gate, ScriptStep, ScriptedResponse, ScriptedTransport};

/// Response body as delivered by the transport, one chunk at a time.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, String>> + Send>>;

/// A fully-formed HTTP request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// `POST url` with `body` serialized as JSON.
    pub fn post_json<T: Serialize + ?Sized>(url: impl Into<String>, body: &T) -> Result<Self> {
        let body =
            serde_json::to_vec(body).map_err(|e| StreamError::InvalidRequest(e.to_string()))?;
        Ok(Self::new(Method::POST, url)
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Status line plus a still-unread body.
pub struct TransportResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Issues a request and hands back the response as soon as headers arrive.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_json_descriptor() {
        let descriptor =
            RequestDescriptor::post_json("http://localhost/api/chat", &serde_json::json!({"q": 1}))
                .unwrap()
                .with_header("authorization", "Bearer t");

        assert_eq!(descriptor.method, Method::POST);
        assert_eq!(descriptor.body.as_deref(), Some(br#"{"q":1}"#.as_slice()));
        assert_eq!(
            descriptor.headers,
            vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("authorization".to_string(), "Bearer t".to_string()),
            ]
        );
    }
}
