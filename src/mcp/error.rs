//! Error types for protocol client operations.

use std::error::Error as StdError;
use std::fmt;

/// Failures while discovering a server's manifest. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The manifest request never produced a response.
    Unreachable(String),
    /// The server answered with a non-success status.
    Status { status: u16, body: String },
    /// The server answered successfully but the body is not a manifest.
    Unparseable {
        status: u16,
        body: String,
        detail: String,
    },
}

impl DiscoveryError {
    /// HTTP status of the failed response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            DiscoveryError::Unreachable(_) => None,
            DiscoveryError::Status { status, .. } | DiscoveryError::Unparseable { status, .. } => {
                Some(*status)
            }
        }
    }
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::Unreachable(reason) => {
                write!(f, "Failed to fetch manifest: {reason}")
            }
            DiscoveryError::Status { status, body } => {
                write!(f, "Failed to fetch manifest: {status} {body}")
            }
            DiscoveryError::Unparseable {
                status,
                body,
                detail,
            } => write!(f, "Failed to parse manifest ({status}): {detail}: {body}"),
        }
    }
}

/// Errors produced by the protocol client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpError {
    /// Manifest unreachable or unparseable.
    Discovery(DiscoveryError),
    /// Connection-level failure before any response headers arrived.
    Transport(String),
    /// The request could not be built or sent as described.
    InvalidRequest(String),
    /// Non-success HTTP status on a tool invocation.
    Protocol { status: u16, body: String },
    /// The response body failed after the headers were received.
    Stream(String),
    /// Inputs rejected by the tool's declared input schema.
    InvalidInput(Vec<String>),
}

impl McpError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    pub fn is_discovery(&self) -> bool {
        matches!(self, McpError::Discovery(_))
    }

    /// True for failures the reconnecting fetcher is allowed to retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, McpError::Transport(_))
    }
}

impl From<DiscoveryError> for McpError {
    fn from(err: DiscoveryError) -> Self {
        McpError::Discovery(err)
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McpError::Discovery(err) => write!(f, "{err}"),
            McpError::Transport(msg) => write!(f, "Network error: {msg}"),
            McpError::InvalidRequest(msg) => write!(f, "Request failed: {msg}"),
            McpError::Protocol { status, .. } => write!(f, "HTTP {status}"),
            McpError::Stream(msg) => write!(f, "Stream interrupted: {msg}"),
            McpError::InvalidInput(problems) => {
                write!(f, "Invalid inputs: {}", problems.join("; "))
            }
        }
    }
}

impl StdError for DiscoveryError {}

impl StdError for McpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            McpError::Discovery(err) => Some(err),
            _ => None,
        }
    }
}
