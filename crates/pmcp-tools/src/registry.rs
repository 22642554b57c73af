//! Tool registry: static catalog plus dispatch by tool name.

use std::sync::Arc;

use pmcp_protocol::{CallToolParams, McpError};
use pmcp_upstream::Generator;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::schema::ToolDescriptor;
use crate::{ToolOutput, image, models, text};

/// Every tool the relay exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GenerateImage = 0,
    GenerateText = 1,
    ListModels = 2,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [Self::GenerateImage, Self::GenerateText, Self::ListModels];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            image::NAME => Some(Self::GenerateImage),
            text::NAME => Some(Self::GenerateText),
            models::NAME => Some(Self::ListModels),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateImage => image::NAME,
            Self::GenerateText => text::NAME,
            Self::ListModels => models::NAME,
        }
    }

    fn descriptor(&self) -> ToolDescriptor {
        match self {
            Self::GenerateImage => image::descriptor(),
            Self::GenerateText => text::descriptor(),
            Self::ListModels => models::descriptor(),
        }
    }
}

/// Immutable catalog of tools bound to one generation backend.
pub struct ToolRegistry<G: Generator> {
    generator: Arc<G>,
    /// Indexed by `ToolName as usize`.
    descriptors: [ToolDescriptor; 3],
}

impl<G: Generator> ToolRegistry<G> {
    pub fn new(generator: Arc<G>) -> Self {
        let descriptors = ToolName::ALL.map(|t| t.descriptor());
        Self {
            generator,
            descriptors,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        ToolName::ALL.iter().map(ToolName::as_str).collect()
    }

    pub fn descriptor(&self, tool: ToolName) -> &ToolDescriptor {
        &self.descriptors[tool as usize]
    }

    /// The `tools/list` result.
    pub fn list(&self) -> Value {
        let tools: Vec<Value> = self.descriptors.iter().map(ToolDescriptor::to_json).collect();
        json!({ "tools": tools })
    }

    /// Validate and run a tool call, wrapping its output with call metadata.
    pub async fn call(&self, params: CallToolParams) -> Result<Value, McpError> {
        let tool = ToolName::from_name(&params.name)
            .ok_or_else(|| McpError::unknown_tool(&params.name))?;
        let args = self.descriptor(tool).resolve(params.arguments)?;
        debug!(tool = tool.as_str(), "Invoking tool");

        let output = match tool {
            ToolName::GenerateImage => image::run(self.generator.as_ref(), &args).await?,
            ToolName::GenerateText => text::run(self.generator.as_ref(), &args).await?,
            ToolName::ListModels => models::run(),
        };
        Ok(wrap(tool, output))
    }
}

fn wrap(tool: ToolName, output: ToolOutput) -> Value {
    let mut metadata = Map::new();
    metadata.insert("tool".into(), json!(tool.as_str()));
    if let Some(prompt) = output.prompt {
        metadata.insert("prompt".into(), json!(prompt));
    }
    if let Some(model) = output.model {
        metadata.insert("model".into(), json!(model));
    }
    metadata.insert("generatedAt".into(), json!(chrono::Utc::now().to_rfc3339()));
    json!({
        "result": output.result,
        "metadata": metadata,
    })
}
