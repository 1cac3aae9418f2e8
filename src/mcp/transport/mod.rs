//! HTTP transport for the protocol client.
//!
//! Everything above this module talks to the network through
//! [`HttpExchange`], which sends one request and hands back the status,
//! content type, and a lazily-read body. [`ReqwestExchange`] is the real
//! implementation; tests substitute scripted exchanges.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use std::time::Duration;

use crate::mcp::error::McpError;

pub mod reconnect;
pub mod sse;

pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
pub const ACCEPT_JSON_AND_SSE: &str = "application/json, text/event-stream";

const HTTP_POOL_IDLE_TIMEOUT_SECONDS: u64 = 90;
const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

impl HttpMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

pub type BodyStream = BoxStream<'static, Result<Vec<u8>, String>>;

/// Response headers plus a body that has not been read yet.
pub struct HttpReply {
    pub status: u16,
    pub content_type: String,
    pub body: BodyStream,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_event_stream(&self) -> bool {
        is_event_stream_content_type(&self.content_type)
    }

    /// Read the remaining body to completion.
    pub async fn bytes(self) -> Result<Vec<u8>, String> {
        self.body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok::<_, String>(acc)
            })
            .await
    }

    pub async fn text(self) -> Result<String, String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl std::fmt::Debug for HttpReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReply")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Sends a single request. An `Err` means no response was obtained at all;
/// [`McpError::Transport`] marks the failures worth retrying. HTTP error
/// statuses are returned as ordinary replies.
#[async_trait]
pub trait HttpExchange: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, McpError>;
}

#[derive(Clone)]
pub struct ReqwestExchange {
    client: reqwest::Client,
}

impl ReqwestExchange {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, McpError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method.as_reqwest(), &url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify_send_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(|err| err.to_string()))
            .boxed();

        Ok(HttpReply {
            status,
            content_type,
            body,
        })
    }
}

/// A request that could not be built (bad URL, header name or header value)
/// fails the same way on every attempt, so it is terminal. Everything else
/// happened on the wire before headers arrived and may be retried.
fn classify_send_error(err: reqwest::Error) -> McpError {
    if err.is_builder() {
        McpError::InvalidRequest(err.to_string())
    } else {
        McpError::transport(err.to_string())
    }
}

/// Build the shared HTTP client. Only connection setup is bounded here.
/// Per-attempt limits live in the reconnecting fetcher.
pub fn build_http_client(connect_timeout: Duration) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECONDS))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE_PER_HOST)
        .build()
        .map_err(|err| err.to_string())
}

/// Any content type mentioning the event-stream media type, in any position.
pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains(EVENT_STREAM_CONTENT_TYPE)
}
