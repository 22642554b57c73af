//! `generate_text`: single-turn text generation.

use pmcp_protocol::McpError;
use pmcp_upstream::{Generator, TextRequest};
use serde_json::json;
use tracing::info;

use crate::ToolOutput;
use crate::models::TEXT_MODELS;
use crate::schema::{Arguments, ParamSpec, ParamType, ToolDescriptor, str_arg};

pub const NAME: &str = "generate_text";

const DEFAULT_MODEL: &str = "openai";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME,
        description: "Generate text from a prompt using a hosted language model.",
        params: vec![
            ParamSpec::required("prompt", ParamType::String, "The prompt to send to the model"),
            ParamSpec::optional("model", ParamType::String, "Text model to use")
                .with_default(json!(DEFAULT_MODEL))
                .with_allowed(TEXT_MODELS),
        ],
    }
}

pub async fn run<G: Generator>(generator: &G, args: &Arguments) -> Result<ToolOutput, McpError> {
    let request = TextRequest {
        prompt: str_arg(args, "prompt")?.to_string(),
        model: str_arg(args, "model").unwrap_or(DEFAULT_MODEL).to_string(),
    };

    let content = generator
        .generate_text(&request)
        .await
        .map_err(|e| McpError::internal(e.to_string()))?;
    info!(model = %request.model, "Text generated");

    Ok(ToolOutput {
        result: json!({
            "success": true,
            "content": content,
        }),
        prompt: Some(request.prompt),
        model: Some(request.model),
    })
}
