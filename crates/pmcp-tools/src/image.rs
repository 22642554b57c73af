//! `generate_image`: fetches an image from the upstream and inlines it as base64.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pmcp_protocol::McpError;
use pmcp_upstream::{Generator, ImageRequest};
use serde_json::json;
use tracing::info;

use crate::ToolOutput;
use crate::models::IMAGE_MODELS;
use crate::schema::{Arguments, ParamSpec, ParamType, ToolDescriptor, str_arg, u64_arg};

pub const NAME: &str = "generate_image";

const DEFAULT_SIZE: u64 = 1024;
const DEFAULT_MODEL: &str = "flux";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME,
        description: "Generate an image from a text prompt. Returns the image as base64 along with its source URL.",
        params: vec![
            ParamSpec::required("prompt", ParamType::String, "Description of the image to generate"),
            ParamSpec::optional("width", ParamType::Integer, "Image width in pixels")
                .with_default(json!(DEFAULT_SIZE))
                .with_minimum(1),
            ParamSpec::optional("height", ParamType::Integer, "Image height in pixels")
                .with_default(json!(DEFAULT_SIZE))
                .with_minimum(1),
            ParamSpec::optional("model", ParamType::String, "Image model to use")
                .with_default(json!(DEFAULT_MODEL))
                .with_allowed(IMAGE_MODELS),
            ParamSpec::optional("seed", ParamType::Integer, "Seed for reproducible output"),
        ],
    }
}

fn dimension(args: &Arguments, name: &str) -> Result<u32, McpError> {
    let raw = u64_arg(args, name).unwrap_or(DEFAULT_SIZE);
    u32::try_from(raw)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| McpError::invalid_params(format!("Argument '{name}' is out of range")))
}

pub async fn run<G: Generator>(generator: &G, args: &Arguments) -> Result<ToolOutput, McpError> {
    let request = ImageRequest {
        prompt: str_arg(args, "prompt")?.to_string(),
        width: dimension(args, "width")?,
        height: dimension(args, "height")?,
        model: str_arg(args, "model").unwrap_or(DEFAULT_MODEL).to_string(),
        seed: u64_arg(args, "seed"),
    };

    let image = generator
        .generate_image(&request)
        .await
        .map_err(|e| McpError::internal(e.to_string()))?;
    info!(model = %request.model, bytes = image.bytes.len(), "Image generated");

    Ok(ToolOutput {
        result: json!({
            "success": true,
            "base64": STANDARD.encode(&image.bytes),
            "url": image.url,
            "contentType": image.content_type,
        }),
        prompt: Some(request.prompt),
        model: Some(request.model),
    })
}
