//! Protocol client: manifest discovery and streaming tool invocation.

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::mcp::auth::{build_auth_headers, request_headers, Credential, JSON_CONTENT_TYPE};
use crate::mcp::endpoints::{EndpointResolver, DEFAULT_PROBE_TIMEOUT};
use crate::mcp::error::{DiscoveryError, McpError};
use crate::mcp::manifest::Manifest;
use crate::mcp::transport::reconnect::{Backoff, ReconnectingFetcher, DEFAULT_ATTEMPT_TIMEOUT};
use crate::mcp::transport::sse::{EventKind, StreamEvent};
use crate::mcp::transport::{
    build_http_client, HttpExchange, HttpMethod, HttpRequest, ReqwestExchange,
    ACCEPT_JSON_AND_SSE,
};
use crate::utils::url::normalize_base_url;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const STREAM_ENDED_EARLY: &str = "stream ended before a final result";

const ACCEPT_HEADER: &str = "Accept";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub attempt_timeout: Duration,
    pub probe_timeout: Duration,
    pub backoff: Backoff,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            backoff: Backoff::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseStage {
    Log,
    Partial,
    #[default]
    Final,
    Failed,
}

/// One item of a tool run as seen by the caller. `logs` is a snapshot of
/// every log line received so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logs: Vec<String>,
    #[serde(skip)]
    pub stage: ResponseStage,
}

impl ToolResponse {
    fn log(line: String, logs: &[String]) -> Self {
        Self {
            success: true,
            result: Some(json!({ "log": line })),
            error: None,
            logs: logs.to_vec(),
            stage: ResponseStage::Log,
        }
    }

    fn partial(result: Value, logs: &[String]) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            logs: logs.to_vec(),
            stage: ResponseStage::Partial,
        }
    }

    fn final_result(result: Value, logs: &[String]) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            logs: logs.to_vec(),
            stage: ResponseStage::Final,
        }
    }

    fn failure(error: String, logs: &[String]) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
            logs: logs.to_vec(),
            stage: ResponseStage::Failed,
        }
    }

    /// True for the last item of a run (final result or failure).
    pub fn is_terminal(&self) -> bool {
        matches!(self.stage, ResponseStage::Final | ResponseStage::Failed)
    }
}

/// Handle to a running tool invocation.
///
/// Yields [`ToolResponse`]s in wire order and ends after the terminal item.
/// Cancelling (or dropping the handle) stops the producer; nothing further is
/// yielded afterwards, including items that were already buffered.
pub struct ToolRun {
    rx: mpsc::UnboundedReceiver<ToolResponse>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl ToolRun {
    fn new(rx: mpsc::UnboundedReceiver<ToolResponse>, cancel: CancellationToken) -> Self {
        let guard = cancel.clone().drop_guard();
        Self {
            rx,
            cancel,
            _guard: guard,
        }
    }

    pub async fn next_response(&mut self) -> Option<ToolResponse> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for ToolRun {
    type Item = ToolResponse;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

#[derive(Clone)]
pub struct McpClient {
    base_url: String,
    credential: Option<Credential>,
    exchange: Arc<dyn HttpExchange>,
    resolver: Arc<EndpointResolver>,
    fetcher: ReconnectingFetcher,
    attempt_timeout: Duration,
    manifest: Arc<RwLock<Option<Arc<Manifest>>>>,
}

impl McpClient {
    pub fn new(
        base_url: &str,
        credential: Option<Credential>,
        options: ClientOptions,
    ) -> Result<Self, String> {
        let http = build_http_client(options.connect_timeout)?;
        let exchange: Arc<dyn HttpExchange> = Arc::new(ReqwestExchange::new(http));
        Ok(Self::with_exchange(base_url, credential, exchange, options))
    }

    pub fn with_exchange(
        base_url: &str,
        credential: Option<Credential>,
        exchange: Arc<dyn HttpExchange>,
        options: ClientOptions,
    ) -> Self {
        let base_url = normalize_base_url(base_url.trim());
        let resolver = EndpointResolver::new(base_url.clone(), Arc::clone(&exchange))
            .with_probe_timeout(options.probe_timeout);
        let fetcher = ReconnectingFetcher::new(
            Arc::clone(&exchange),
            options.backoff,
            options.attempt_timeout,
        );

        Self {
            base_url,
            credential: credential.filter(|credential| !credential.is_empty()),
            exchange,
            resolver: Arc::new(resolver),
            fetcher,
            attempt_timeout: options.attempt_timeout,
            manifest: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// The manifest from the last successful [`fetch_manifest`](Self::fetch_manifest).
    pub fn current_manifest(&self) -> Option<Arc<Manifest>> {
        self.manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Discover the server's manifest. Failures are returned as-is and never
    /// retried.
    pub async fn fetch_manifest(&self) -> Result<Arc<Manifest>, McpError> {
        let endpoints = self.resolver.resolve().await;
        let url = endpoints.manifest_url(&self.base_url);
        let current = self.current_manifest();
        let auth = current.as_deref().and_then(|manifest| manifest.auth.as_ref());

        let request = HttpRequest::new(HttpMethod::Get, url.clone())
            .with_header(ACCEPT_HEADER, JSON_CONTENT_TYPE)
            .with_headers(build_auth_headers(auth, self.credential.as_ref()));

        debug!(url = %url, "Fetching manifest");
        let reply = match tokio::time::timeout(self.attempt_timeout, self.exchange.send(request))
            .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => return Err(DiscoveryError::Unreachable(err.to_string()).into()),
            Err(_) => {
                return Err(DiscoveryError::Unreachable(format!(
                    "no response within {:?}",
                    self.attempt_timeout
                ))
                .into())
            }
        };

        let status = reply.status;
        let success = reply.is_success();
        let body = reply.text().await.map_err(DiscoveryError::Unreachable)?;

        if !success {
            warn!(url = %url, status, "Manifest request rejected");
            return Err(DiscoveryError::Status { status, body }.into());
        }

        let manifest = match serde_json::from_str::<Manifest>(&body) {
            Ok(manifest) => Arc::new(manifest),
            Err(err) => {
                return Err(DiscoveryError::Unparseable {
                    status,
                    body,
                    detail: err.to_string(),
                }
                .into())
            }
        };

        info!(
            url = %url,
            name = %manifest.name,
            tools = manifest.tools.len(),
            "Manifest loaded"
        );
        *self.manifest.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(&manifest));
        Ok(manifest)
    }

    /// Invoke a tool in a background task and return a handle to its
    /// responses. `cancel` may be shared with the caller; the run watches a
    /// child token so dropping the handle never cancels the parent.
    pub fn execute_tool(&self, slug: &str, inputs: Value, cancel: CancellationToken) -> ToolRun {
        let (tx, rx) = mpsc::unbounded_channel();
        let run_cancel = cancel.child_token();

        let client = self.clone();
        let slug = slug.to_string();
        let task_cancel = run_cancel.clone();
        tokio::spawn(async move {
            client.run_tool(slug, inputs, task_cancel, tx).await;
        });

        ToolRun::new(rx, run_cancel)
    }

    async fn run_tool(
        self,
        slug: String,
        inputs: Value,
        cancel: CancellationToken,
        tx: mpsc::UnboundedSender<ToolResponse>,
    ) {
        let mut logs: Vec<String> = Vec::new();

        let endpoints = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            endpoints = self.resolver.resolve() => endpoints,
        };
        let url = endpoints.tool_url(&self.base_url, &slug);

        let body = match serde_json::to_vec(&inputs) {
            Ok(body) => body,
            Err(err) => {
                send_failure(&tx, &mut logs, err.to_string());
                return;
            }
        };

        let manifest = self.current_manifest();
        let auth = manifest.as_deref().and_then(|manifest| manifest.auth.as_ref());
        let request = HttpRequest::new(HttpMethod::Post, url.clone())
            .with_header(ACCEPT_HEADER, ACCEPT_JSON_AND_SSE)
            .with_headers(request_headers(auth, self.credential.as_ref(), true))
            .with_body(body);

        info!(url = %url, tool = %slug, "Invoking tool");
        let mut events = self.fetcher.fetch_events(request, cancel.clone());

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    warn!(tool = %slug, error = %err, "Tool invocation failed");
                    send_failure(&tx, &mut logs, err.to_string());
                    return;
                }
            };

            let Some(response) = map_event(event, &mut logs) else {
                continue;
            };
            let terminal = response.is_terminal();
            if tx.send(response).is_err() || terminal {
                return;
            }
        }

        if cancel.is_cancelled() {
            debug!(tool = %slug, "Tool run cancelled");
            return;
        }

        warn!(tool = %slug, "Event stream closed without a final event");
        send_failure(&tx, &mut logs, STREAM_ENDED_EARLY.to_string());
    }
}

fn map_event(event: StreamEvent, logs: &mut Vec<String>) -> Option<ToolResponse> {
    match event.kind {
        EventKind::Log => match event.payload {
            Value::String(line) => {
                logs.push(line.clone());
                Some(ToolResponse::log(line, logs))
            }
            _ => {
                debug!("Ignoring log event without a string payload");
                None
            }
        },
        EventKind::Partial => Some(ToolResponse::partial(event.payload, logs)),
        EventKind::Final => Some(ToolResponse::final_result(event.payload, logs)),
        EventKind::Message | EventKind::Other(_) => {
            debug!(kind = %event.kind, "Ignoring event");
            None
        }
    }
}

fn send_failure(tx: &mpsc::UnboundedSender<ToolResponse>, logs: &mut Vec<String>, error: String) {
    logs.push(format!("Error: {error}"));
    let _ = tx.send(ToolResponse::failure(error, logs));
}
