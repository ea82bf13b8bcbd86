use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::warn;

use super::{RequestDescriptor, Transport, TransportResponse};
use crate::error::Result;

/// Set to bypass `HTTP(S)_PROXY` and other system proxy settings.
pub const DISABLE_SYSTEM_PROXY_ENV: &str = "ZEPCHAT_DISABLE_SYSTEM_PROXY";

/// The `reqwest` client used for every outbound ZepChat call.
///
/// System proxies apply unless [`DISABLE_SYSTEM_PROXY_ENV`] is set; unit
/// tests of this crate always go direct.
pub fn build_http_client() -> Client {
    let direct = std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() || cfg!(test);
    if direct {
        direct_http_client()
    } else {
        Client::new()
    }
}

/// A client that ignores system proxy settings.
pub fn direct_http_client() -> Client {
    Client::builder().no_proxy().build().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build direct HTTP client, using defaults");
        Client::new()
    })
}

/// [`Transport`] over `reqwest`, streaming the body with `bytes_stream`.
///
/// No timeout is configured; callers bound a request by dropping its future.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: build_http_client(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| e.to_string()));

        Ok(TransportResponse {
            status,
            body: Box::pin(body),
        })
    }
}
