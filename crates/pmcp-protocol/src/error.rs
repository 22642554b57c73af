//! The JSON-RPC error object and the codes this relay puts on the wire.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Error codes the relay emits. Anything else read back from the wire is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpErrorCode {
    ParseError,
    InvalidRequest,
    /// Unknown method or unknown tool name.
    MethodNotFound,
    InvalidParams,
    /// Tool or upstream failure.
    InternalError,
    /// `tools/*` on a stream that never sent `initialize`.
    ServerNotInitialized,
    Other(i32),
}

impl McpErrorCode {
    pub fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerNotInitialized => -32002,
            Self::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32002 => Self::ServerNotInitialized,
            other => Self::Other(other),
        }
    }
}

impl From<McpErrorCode> for i32 {
    fn from(code: McpErrorCode) -> Self {
        code.code()
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("MCP Error [{code}]: {message}")]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl McpError {
    pub fn new(code: McpErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn error_code(&self) -> McpErrorCode {
        McpErrorCode::from_code(self.code)
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(McpErrorCode::MethodNotFound, format!("Method not found: {method}"))
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(McpErrorCode::MethodNotFound, format!("Unknown tool: {name}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InvalidParams, message)
    }

    /// Generic message; the original failure text goes in `data.details`.
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InternalError, "Internal error")
            .with_data(json!({ "details": details.into() }))
    }

    pub fn not_initialized() -> Self {
        Self::new(
            McpErrorCode::ServerNotInitialized,
            "Server not initialized. Send initialize first.",
        )
    }
}
