//! Tool catalog and handlers.
//!
//! The registry is fixed at construction: three tools, each described by a
//! static [`ToolDescriptor`]. Calls are dispatched through the closed
//! [`ToolName`] enum, so an unknown name can only come from the wire.

pub mod image;
pub mod models;
pub mod registry;
pub mod schema;
pub mod text;

use serde_json::Value;

pub use registry::{ToolName, ToolRegistry};
pub use schema::{ParamSpec, ParamType, ToolDescriptor};

/// What a tool produced, before the call metadata is attached.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub result: Value,
    pub prompt: Option<String>,
    pub model: Option<String>,
}
