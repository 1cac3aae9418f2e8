//! Manifest-based tool protocol client.
//!
//! A server publishes a manifest describing its tools; tools are invoked with
//! a POST and answer either with plain JSON or with an event stream of
//! `log`, `partial`, and `final` events.

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod execution;
pub mod inputs;
pub mod manifest;
pub mod transport;

pub use auth::{build_auth_headers, Credential};
pub use client::{ClientOptions, McpClient, ResponseStage, ToolResponse, ToolRun};
pub use error::{DiscoveryError, McpError};
pub use execution::{complete_execution, create_execution, ExecutionRecord, ExecutionStatus};
pub use manifest::{AuthDescriptor, AuthType, Manifest, Tool};
