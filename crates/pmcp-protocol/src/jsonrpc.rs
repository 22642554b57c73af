//! JSON-RPC 2.0 base types for MCP.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

/// The only accepted value of the `jsonrpc` field.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request ID, either a string or integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Incoming JSON-RPC 2.0 message. A message without `id` is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSuccessResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: Value,
}

/// JSON-RPC 2.0 error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpErrorResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    pub error: McpError,
}

/// JSON-RPC 2.0 response (success or error).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpResponse {
    Success(McpSuccessResponse),
    Error(McpErrorResponse),
}

/// Result from a method or tool handler.
pub type HandlerResult = Result<Value, McpError>;

/// Envelope rejected before dispatch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnvelopeError {
    #[error("body is not valid JSON: {0}")]
    Parse(String),
    #[error("invalid JSON-RPC 2.0 request: {reason}")]
    Invalid {
        id: Option<RequestId>,
        reason: String,
    },
}

impl EnvelopeError {
    fn invalid(id: Option<RequestId>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            id,
            reason: reason.into(),
        }
    }

    /// The JSON-RPC error response answering this rejection.
    pub fn into_response(self) -> McpResponse {
        match self {
            Self::Parse(details) => McpResponse::error(
                None,
                McpError::parse_error("Parse error").with_data(Value::String(details)),
            ),
            Self::Invalid { id, reason } => McpResponse::error(
                id,
                McpError::invalid_request("Invalid Request").with_data(Value::String(reason)),
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse and validate a raw request body.
pub fn parse_message(body: &[u8]) -> Result<RpcMessage, EnvelopeError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| EnvelopeError::Parse(e.to_string()))?;
    RpcMessage::from_value(value)
}

impl RpcMessage {
    /// Validate an already-decoded JSON value as a JSON-RPC 2.0 message.
    ///
    /// The `id` is extracted first so that version and method failures can
    /// still echo it back.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut obj) = value else {
            return Err(EnvelopeError::invalid(None, "request must be a JSON object"));
        };

        let id = match obj.remove("id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value::<RequestId>(raw).map_err(|_| {
                EnvelopeError::invalid(None, "id must be a string or an integer")
            })?),
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(EnvelopeError::invalid(id, "jsonrpc must be \"2.0\""));
        }

        let method = match obj.remove("method") {
            Some(Value::String(m)) if !m.is_empty() => m,
            _ => return Err(EnvelopeError::invalid(id, "method must be a non-empty string")),
        };

        let params = obj.remove("params").filter(|p| !p.is_null());

        Ok(Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            method,
            params,
        })
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

impl McpSuccessResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result,
        }
    }
}

impl McpErrorResponse {
    pub fn new(id: Option<RequestId>, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            error,
        }
    }
}

impl McpResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self::Success(McpSuccessResponse::new(id, result))
    }

    pub fn error(id: Option<RequestId>, error: McpError) -> Self {
        Self::Error(McpErrorResponse::new(id, error))
    }

    /// Build the response for a handler outcome, echoing `id`.
    pub fn from_result(id: RequestId, result: HandlerResult) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(err) => Self::error(Some(id), err),
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Success(s) => Some(&s.id),
            Self::Error(e) => e.id.as_ref(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
