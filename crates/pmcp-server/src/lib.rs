//! MCP Server: dispatches JSON-RPC methods to the tool catalog.
//!
//! The server owns the tool registry and provides the `RequestHandler`
//! implementation for the transport layer.

pub mod router;

pub use router::{McpServer, ServerConfig};
