//! mcp-browser is a command-line client for servers that expose remotely
//! hosted tools through a manifest-based MCP interface.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`mcp`] is the protocol client: endpoint discovery, manifest fetching,
//!   auth headers, the event-stream decoder, the reconnecting fetcher, the
//!   streaming tool invoker, and execution bookkeeping.
//! - [`core`] owns configuration, persisted history, saved tokens, and the
//!   cached server directory.
//! - [`cli`] parses arguments and drives the protocol client from a terminal.
//! - [`utils`] holds URL and logging helpers shared by the layers above.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod cli;
pub mod core;
pub mod mcp;
pub mod utils;
