//! MCP Server Router: dispatches JSON-RPC methods.

use pmcp_protocol::{
    CallToolParams, CallToolResult, HandlerResult, InitializeParams, InitializeResult, McpError,
    Method, RequestContext, SERVER_NAME,
};
use pmcp_tools::ToolRegistry;
use pmcp_transport::RequestHandler;
use pmcp_upstream::Generator;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Reject `tools/*` on a stream whose session has not completed `initialize`.
    pub require_initialize: bool,
    /// Reported as `serverInfo.version`
    pub version: String,
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_initialize: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }
}

/// The MCP server. Owns the tool catalog and routes requests.
pub struct McpServer<G: Generator> {
    tools: ToolRegistry<G>,
    config: ServerConfig,
}

impl<G: Generator> McpServer<G> {
    pub fn new(tools: ToolRegistry<G>, config: ServerConfig) -> Self {
        info!(
            "MCP server ready ({} tools, initialize {})",
            tools.names().len(),
            if config.require_initialize { "required" } else { "optional" }
        );
        Self { tools, config }
    }

    fn initialize(&self, params: Option<Value>, ctx: &RequestContext) -> HandlerResult {
        let params: InitializeParams = match params {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| McpError::invalid_params(format!("Invalid initialize params: {e}")))?,
            None => InitializeParams::default(),
        };

        let client = params
            .client_info
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("unknown");
        info!(
            client,
            requested = params.protocol_version.as_deref().unwrap_or("-"),
            connection = ctx.connection_id.as_deref().unwrap_or("direct"),
            "Client initialized"
        );

        if let Some(session) = &ctx.session {
            session.mark_initialized();
        }

        let mut result = InitializeResult::new(self.config.version.clone());
        if let Some(instructions) = &self.config.instructions {
            result = result.with_instructions(instructions.clone());
        }
        to_value(result)
    }

    async fn call_tool(&self, params: Option<Value>) -> HandlerResult {
        let params: CallToolParams = params
            .ok_or_else(|| McpError::invalid_params("Missing params for tools/call"))
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|e| McpError::invalid_params(format!("Invalid tools/call params: {e}")))
            })?;
        let name = params.name.clone();

        let output = match self.tools.call(params).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %name, "Tool call failed: {e}");
                return Err(e);
            }
        };
        info!(tool = %name, "Tool call completed");

        let text = serde_json::to_string(&output)
            .map_err(|e| McpError::internal(format!("Failed to encode tool output: {e}")))?;
        to_value(CallToolResult::text(text))
    }

    /// `tools/*` is refused on a stream that has not completed the handshake.
    /// Stateless requests carry no session and are never gated.
    fn check_initialized(&self, method: Method, ctx: &RequestContext) -> Result<(), McpError> {
        if !self.config.require_initialize || !method.requires_initialized() {
            return Ok(());
        }
        match &ctx.session {
            Some(session) if !session.is_initialized() => Err(McpError::not_initialized()),
            _ => Ok(()),
        }
    }
}

impl<G: Generator> RequestHandler for McpServer<G> {
    async fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> HandlerResult {
        let Some(method) = Method::from_name(method) else {
            debug!("Unknown method: {method}");
            return Err(McpError::method_not_found(method));
        };
        self.check_initialized(method, ctx)?;

        match method {
            Method::Initialize => self.initialize(params, ctx),
            Method::Initialized => Ok(Value::Null),
            Method::Ping => Ok(json!({})),
            Method::ToolsList => Ok(self.tools.list()),
            Method::ToolsCall => self.call_tool(params).await,
        }
    }

    fn tool_names(&self) -> Vec<String> {
        self.tools.names().into_iter().map(str::to_string).collect()
    }

    fn server_info(&self) -> Value {
        json!({
            "name": SERVER_NAME,
            "version": self.config.version,
        })
    }
}

fn to_value<T: serde::Serialize>(value: T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| McpError::internal(e.to_string()))
}
