//! MCP (Model Context Protocol) - Protocol Types
//!
//! JSON-RPC 2.0 types for the relay's tool-invocation protocol.
//! This crate is the single source of truth for envelope validation,
//! method names, handshake payloads and error codes.

pub mod context;
pub mod error;
pub mod initialize;
pub mod jsonrpc;
pub mod methods;

pub use context::{RequestContext, SessionState};
pub use error::{McpError, McpErrorCode};
pub use initialize::{
    CallToolParams, CallToolResult, Content, InitializeParams, InitializeResult,
    PROTOCOL_VERSION, SERVER_NAME,
};
pub use jsonrpc::{
    EnvelopeError, HandlerResult, McpErrorResponse, McpResponse, McpSuccessResponse,
    RequestId, RpcMessage, parse_message,
};
pub use methods::{Method, MethodName, Methods};
