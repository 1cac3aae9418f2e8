//! Endpoint discovery.
//!
//! Servers publish the manifest and tool routes under either a modern or a
//! legacy path. A HEAD probe against each modern path decides which one to
//! use; any probe failure silently selects the legacy path.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::mcp::transport::{HttpExchange, HttpMethod, HttpRequest};
use crate::utils::url::construct_api_url;

pub const MODERN_MANIFEST_PATH: &str = "/.well-known/mcp.json";
pub const LEGACY_MANIFEST_PATH: &str = "/manifest";
pub const MODERN_TOOLS_PATH: &str = "/v1/tools";
pub const LEGACY_TOOLS_PATH: &str = "/tools";

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    pub manifest_path: &'static str,
    pub tools_path: &'static str,
}

impl Endpoints {
    pub fn manifest_url(&self, base_url: &str) -> String {
        construct_api_url(base_url, self.manifest_path)
    }

    pub fn tool_url(&self, base_url: &str, slug: &str) -> String {
        construct_api_url(base_url, &format!("{}/{}", self.tools_path, slug))
    }
}

/// Two independent binary choices, one per probe.
pub fn select_endpoints(manifest_probe_ok: bool, tools_probe_ok: bool) -> Endpoints {
    Endpoints {
        manifest_path: if manifest_probe_ok {
            MODERN_MANIFEST_PATH
        } else {
            LEGACY_MANIFEST_PATH
        },
        tools_path: if tools_probe_ok {
            MODERN_TOOLS_PATH
        } else {
            LEGACY_TOOLS_PATH
        },
    }
}

pub struct EndpointResolver {
    base_url: String,
    exchange: Arc<dyn HttpExchange>,
    probe_timeout: Duration,
    resolved: Mutex<Option<Endpoints>>,
}

impl EndpointResolver {
    pub fn new(base_url: impl Into<String>, exchange: Arc<dyn HttpExchange>) -> Self {
        Self {
            base_url: base_url.into(),
            exchange,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            resolved: Mutex::new(None),
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Endpoints from the most recent [`resolve`](Self::resolve), if any.
    pub fn cached(&self) -> Option<Endpoints> {
        *self.resolved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Probe the server again and remember the outcome. Never fails.
    pub async fn resolve(&self) -> Endpoints {
        let (manifest_ok, tools_ok) = tokio::join!(
            self.probe(MODERN_MANIFEST_PATH),
            self.probe(MODERN_TOOLS_PATH)
        );
        let endpoints = select_endpoints(manifest_ok, tools_ok);
        debug!(
            base_url = %self.base_url,
            manifest_path = endpoints.manifest_path,
            tools_path = endpoints.tools_path,
            "Resolved endpoints"
        );

        *self.resolved.lock().unwrap_or_else(PoisonError::into_inner) = Some(endpoints);
        endpoints
    }

    async fn probe(&self, path: &str) -> bool {
        let url = construct_api_url(&self.base_url, path);
        let request = HttpRequest::new(HttpMethod::Head, url.clone());

        match tokio::time::timeout(self.probe_timeout, self.exchange.send(request)).await {
            Ok(Ok(reply)) => {
                debug!(url = %url, status = reply.status, "Probe answered");
                reply.is_success()
            }
            Ok(Err(err)) => {
                debug!(url = %url, error = %err, "Probe failed");
                false
            }
            Err(_) => {
                debug!(url = %url, "Probe timed out");
                false
            }
        }
    }
}
