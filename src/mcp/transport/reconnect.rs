//! Single-request fetcher with reconnect and backoff.
//!
//! Connection-level failures (no response headers yet) are retried forever
//! with exponential backoff until the caller cancels. Requests that cannot be
//! built and HTTP error statuses are terminal. Non-streaming replies are folded into a single `final` event so
//! callers only ever see a sequence of [`StreamEvent`]s.

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::sse::{self, EventKind, SseEventStream, StreamEvent};
use super::{HttpExchange, HttpReply, HttpRequest};
use crate::mcp::error::McpError;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// `delay(n) = min(initial * 2^n, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_DELAY,
            max: DEFAULT_MAX_DELAY,
        }
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.initial.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Attempting { attempt: u32 },
    Backoff { attempt: u32, delay: Duration },
    Succeeded,
    Cancelled,
}

/// Retry bookkeeping for one request:
/// `Idle → Attempting → Backoff → Attempting → … → Succeeded | Cancelled`.
#[derive(Debug, Clone)]
pub struct RetryLoop {
    backoff: Backoff,
    state: RetryState,
    failures: u32,
}

impl RetryLoop {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            state: RetryState::Idle,
            failures: 0,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Returns the zero-based attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.state = RetryState::Attempting {
            attempt: self.failures,
        };
        self.failures
    }

    /// Returns how long to wait before the next attempt.
    pub fn record_failure(&mut self) -> Duration {
        let attempt = self.failures;
        let delay = self.backoff.delay_for(attempt);
        self.state = RetryState::Backoff { attempt, delay };
        self.failures = self.failures.saturating_add(1);
        delay
    }

    pub fn record_success(&mut self) {
        self.state = RetryState::Succeeded;
    }

    pub fn cancel(&mut self) {
        self.state = RetryState::Cancelled;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RetryState::Succeeded | RetryState::Cancelled)
    }
}

pub type FetchStream = BoxStream<'static, Result<StreamEvent, McpError>>;

enum FetchPhase {
    Connect(HttpRequest),
    Streaming(SseEventStream),
    Done,
}

#[derive(Clone)]
pub struct ReconnectingFetcher {
    exchange: Arc<dyn HttpExchange>,
    backoff: Backoff,
    attempt_timeout: Duration,
}

impl ReconnectingFetcher {
    pub fn new(exchange: Arc<dyn HttpExchange>, backoff: Backoff, attempt_timeout: Duration) -> Self {
        Self {
            exchange,
            backoff,
            attempt_timeout,
        }
    }

    /// Send `request` until a response arrives or a non-transient error
    /// occurs. Returns `None` once `cancel` fires; no error is reported for a
    /// cancelled request.
    pub async fn connect(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Option<Result<HttpReply, McpError>> {
        let mut retry = RetryLoop::new(self.backoff);

        loop {
            let attempt = retry.begin_attempt();
            debug!(url = %request.url, attempt, "Sending request");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    retry.cancel();
                    debug!(url = %request.url, "Request cancelled");
                    return None;
                }
                outcome = tokio::time::timeout(
                    self.attempt_timeout,
                    self.exchange.send(request.clone()),
                ) => outcome,
            };

            let failure = match outcome {
                Ok(Ok(reply)) => {
                    retry.record_success();
                    debug!(url = %request.url, status = reply.status, "Response received");
                    return Some(Ok(reply));
                }
                Ok(Err(err)) if !err.is_transient() => {
                    retry.cancel();
                    warn!(url = %request.url, error = %err, "Request failed");
                    return Some(Err(err));
                }
                Ok(Err(err)) => err,
                Err(_) => McpError::transport(format!(
                    "no response within {:?}",
                    self.attempt_timeout
                )),
            };

            let delay = retry.record_failure();
            warn!(
                url = %request.url,
                attempt = attempt + 1,
                backoff_ms = delay.as_millis() as u64,
                error = %failure,
                "Request failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    retry.cancel();
                    debug!(url = %request.url, "Retry loop cancelled");
                    return None;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Issue `request` and expose the reply as a sequence of events.
    ///
    /// - event-stream replies are decoded and forwarded in wire order;
    /// - any other successful reply becomes exactly one `final` event;
    /// - a non-success status yields one [`McpError::Protocol`] and ends;
    /// - a request that cannot be sent yields that error and ends;
    /// - cancellation ends the sequence without an error.
    pub fn fetch_events(&self, request: HttpRequest, cancel: CancellationToken) -> FetchStream {
        let state = (self.clone(), FetchPhase::Connect(request), cancel);

        stream::unfold(state, |(fetcher, mut phase, cancel)| async move {
            loop {
                match phase {
                    FetchPhase::Done => return None,
                    FetchPhase::Connect(request) => {
                        let reply = match fetcher.connect(&request, &cancel).await {
                            None => return None,
                            Some(Ok(reply)) => reply,
                            Some(Err(err)) => {
                                return Some((Err(err), (fetcher, FetchPhase::Done, cancel)));
                            }
                        };

                        if !reply.is_success() {
                            let status = reply.status;
                            let Some(body) = read_text(reply, &cancel).await else {
                                return None;
                            };
                            let body = body.unwrap_or_default();
                            warn!(url = %request.url, status, "Request rejected");
                            let err = McpError::Protocol { status, body };
                            return Some((Err(err), (fetcher, FetchPhase::Done, cancel)));
                        }

                        if !reply.is_event_stream() {
                            let Some(text) = read_text(reply, &cancel).await else {
                                return None;
                            };
                            let item = match text {
                                Ok(text) => Ok(StreamEvent::new(
                                    EventKind::Final,
                                    sse::parse_payload(text),
                                )),
                                Err(err) => Err(McpError::stream(err)),
                            };
                            return Some((item, (fetcher, FetchPhase::Done, cancel)));
                        }

                        phase = FetchPhase::Streaming(sse::events(reply.body));
                    }
                    FetchPhase::Streaming(mut events) => {
                        let next = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                debug!("Event stream cancelled");
                                None
                            }
                            next = events.next() => next,
                        };

                        return match next {
                            Some(Ok(event)) => Some((
                                Ok(event),
                                (fetcher, FetchPhase::Streaming(events), cancel),
                            )),
                            Some(Err(err)) => Some((
                                Err(McpError::stream(err)),
                                (fetcher, FetchPhase::Done, cancel),
                            )),
                            None => None,
                        };
                    }
                }
            }
        })
        .boxed()
    }
}

async fn read_text(reply: HttpReply, cancel: &CancellationToken) -> Option<Result<String, String>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        text = reply.text() => Some(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::{HttpMethod, EVENT_STREAM_CONTENT_TYPE};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    enum Step {
        Fail(&'static str),
        Reject(&'static str),
        Hang,
        Reply {
            status: u16,
            content_type: &'static str,
            chunks: Vec<&'static str>,
        },
    }

    struct ScriptedExchange {
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedExchange {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpExchange for ScriptedExchange {
        async fn send(&self, _request: HttpRequest) -> Result<HttpReply, McpError> {
            self.calls.lock().unwrap().push(Instant::now());
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Step::Fail("script exhausted"));
            match step {
                Step::Fail(reason) => Err(McpError::transport(reason)),
                Step::Reject(reason) => Err(McpError::InvalidRequest(reason.to_string())),
                Step::Hang => std::future::pending().await,
                Step::Reply {
                    status,
                    content_type,
                    chunks,
                } => Ok(HttpReply {
                    status,
                    content_type: content_type.to_string(),
                    body: stream::iter(
                        chunks
                            .into_iter()
                            .map(|chunk| Ok(chunk.as_bytes().to_vec()))
                            .collect::<Vec<_>>(),
                    )
                    .boxed(),
                }),
            }
        }
    }

    fn fetcher(exchange: Arc<ScriptedExchange>) -> ReconnectingFetcher {
        ReconnectingFetcher::new(exchange, Backoff::default(), DEFAULT_ATTEMPT_TIMEOUT)
    }

    fn request() -> HttpRequest {
        HttpRequest::new(HttpMethod::Post, "http://mcp.test/v1/tools/echo")
    }

    fn json_reply(body: &'static str) -> Step {
        Step::Reply {
            status: 200,
            content_type: "application/json",
            chunks: vec![body],
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = Backoff::default();
        let delays: Vec<u64> = (0..7)
            .map(|attempt| backoff.delay_for(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
        assert_eq!(backoff.delay_for(64), DEFAULT_MAX_DELAY);
    }

    #[test]
    fn retry_loop_walks_through_states() {
        let mut retry = RetryLoop::new(Backoff::default());
        assert_eq!(retry.state(), RetryState::Idle);

        assert_eq!(retry.begin_attempt(), 0);
        assert_eq!(retry.state(), RetryState::Attempting { attempt: 0 });
        assert_eq!(retry.record_failure(), Duration::from_millis(1000));
        assert_eq!(
            retry.state(),
            RetryState::Backoff {
                attempt: 0,
                delay: Duration::from_millis(1000)
            }
        );

        assert_eq!(retry.begin_attempt(), 1);
        assert_eq!(retry.record_failure(), Duration::from_millis(2000));
        assert!(!retry.is_terminal());

        retry.begin_attempt();
        retry.record_success();
        assert!(retry.is_terminal());
        assert_eq!(retry.state(), RetryState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn network_failures_back_off_before_success() {
        let exchange = ScriptedExchange::new(vec![
            Step::Fail("connection refused"),
            Step::Fail("connection refused"),
            Step::Fail("connection reset"),
            json_reply("{\"ok\":true}"),
        ]);

        let items: Vec<_> = fetcher(exchange.clone())
            .fetch_events(request(), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(
            items,
            vec![Ok(StreamEvent::new(EventKind::Final, json!({"ok": true})))]
        );

        let calls = exchange.call_times();
        assert_eq!(calls.len(), 4);
        let gaps: Vec<u64> = calls
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis() as u64)
            .collect();
        assert_eq!(gaps, vec![1000, 2000, 4000]);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout_counts_as_network_failure() {
        let exchange = ScriptedExchange::new(vec![Step::Hang, json_reply("1")]);
        let items: Vec<_> = fetcher(exchange.clone())
            .fetch_events(request(), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(items, vec![Ok(StreamEvent::new(EventKind::Final, json!(1)))]);
        let calls = exchange.call_times();
        assert_eq!(
            (calls[1] - calls[0]).as_millis() as u64,
            (DEFAULT_ATTEMPT_TIMEOUT + DEFAULT_INITIAL_DELAY).as_millis() as u64
        );
    }

    #[tokio::test]
    async fn error_status_is_terminal_and_not_retried() {
        let exchange = ScriptedExchange::new(vec![
            Step::Reply {
                status: 500,
                content_type: "text/plain",
                chunks: vec!["boom"],
            },
            json_reply("{}"),
        ]);

        let items: Vec<_> = fetcher(exchange.clone())
            .fetch_events(request(), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(
            items,
            vec![Err(McpError::Protocol {
                status: 500,
                body: "boom".to_string()
            })]
        );
        assert_eq!(exchange.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unsendable_request_fails_once_without_retry() {
        let exchange = ScriptedExchange::new(vec![
            Step::Reject("invalid HTTP header name"),
            json_reply("{}"),
        ]);

        let items: Vec<_> = fetcher(exchange.clone())
            .fetch_events(request(), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(
            items,
            vec![Err(McpError::InvalidRequest(
                "invalid HTTP header name".to_string()
            ))]
        );
        assert_eq!(exchange.call_times().len(), 1);
    }

    #[tokio::test]
    async fn non_json_body_becomes_string_final() {
        let exchange = ScriptedExchange::new(vec![Step::Reply {
            status: 200,
            content_type: "text/plain",
            chunks: vec!["plain ", "text"],
        }]);
        let items: Vec<_> = fetcher(exchange)
            .fetch_events(request(), CancellationToken::new())
            .collect()
            .await;
        assert_eq!(
            items,
            vec![Ok(StreamEvent::new(EventKind::Final, json!("plain text")))]
        );
    }

    #[tokio::test]
    async fn event_stream_reply_forwards_every_event() {
        let exchange = ScriptedExchange::new(vec![Step::Reply {
            status: 200,
            content_type: EVENT_STREAM_CONTENT_TYPE,
            chunks: vec![
                "event: log\ndata: \"starting\"\n\n",
                "event: partial\ndata: {\"n\":1}\n\nevent: fin",
                "al\ndata: {\"n\":2}\n\n",
            ],
        }]);
        let items: Vec<_> = fetcher(exchange)
            .fetch_events(request(), CancellationToken::new())
            .collect()
            .await;
        assert_eq!(
            items,
            vec![
                Ok(StreamEvent::new(EventKind::Log, json!("starting"))),
                Ok(StreamEvent::new(EventKind::Partial, json!({"n": 1}))),
                Ok(StreamEvent::new(EventKind::Final, json!({"n": 2}))),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_during_backoff_ends_quietly() {
        let exchange = ScriptedExchange::new(vec![
            Step::Fail("down"),
            Step::Fail("down"),
            Step::Fail("down"),
        ]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            trigger.cancel();
        });

        let items: Vec<_> = fetcher(exchange.clone())
            .fetch_events(request(), cancel)
            .collect()
            .await;

        assert!(items.is_empty());
        assert_eq!(exchange.call_times().len(), 2);
    }

    #[tokio::test]
    async fn already_cancelled_request_is_never_sent() {
        let exchange = ScriptedExchange::new(vec![json_reply("{}")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reply = fetcher(exchange.clone()).connect(&request(), &cancel).await;
        assert!(reply.is_none());
        assert!(exchange.call_times().is_empty());
    }
}
