//! `list_models`: the static model catalog. Never calls the upstream.

use serde_json::json;

use crate::ToolOutput;
use crate::schema::ToolDescriptor;

pub const NAME: &str = "list_models";

pub const IMAGE_MODELS: &[&str] = &["flux", "turbo", "gptimage"];

pub const TEXT_MODELS: &[&str] = &[
    "openai",
    "openai-large",
    "mistral",
    "llama",
    "deepseek",
    "qwen-coder",
];

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: NAME,
        description: "List the image and text models available for generation.",
        params: Vec::new(),
    }
}

pub fn run() -> ToolOutput {
    ToolOutput {
        result: json!({
            "image": IMAGE_MODELS,
            "text": TEXT_MODELS,
        }),
        prompt: None,
        model: None,
    }
}
