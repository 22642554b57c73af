//! Tool descriptors and argument validation.

use pmcp_protocol::McpError;
use serde_json::{Map, Value, json};

pub type Arguments = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    /// Non-negative integer.
    Integer,
}

impl ParamType {
    fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

/// One named tool parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<Value>,
    pub allowed: Option<&'static [&'static str]>,
    /// Lower bound for integer params.
    pub minimum: u64,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
            default: None,
            allowed: None,
            minimum: 0,
        }
    }

    pub fn optional(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_allowed(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn with_minimum(mut self, minimum: u64) -> Self {
        self.minimum = minimum;
        self
    }

    fn schema(&self) -> Value {
        let mut schema = json!({
            "type": self.kind.json_type(),
            "description": self.description,
        });
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        if let Some(allowed) = self.allowed {
            schema["enum"] = json!(allowed);
        }
        if self.kind == ParamType::Integer {
            schema["minimum"] = json!(self.minimum);
        }
        schema
    }

    fn check(&self, value: &Value) -> Result<(), McpError> {
        match self.kind {
            ParamType::String => {
                let s = value.as_str().ok_or_else(|| {
                    McpError::invalid_params(format!("Argument '{}' must be a string", self.name))
                })?;
                if self.required && s.trim().is_empty() {
                    return Err(McpError::invalid_params(format!(
                        "Argument '{}' must not be empty",
                        self.name
                    )));
                }
                if let Some(allowed) = self.allowed {
                    if !allowed.contains(&s) {
                        return Err(McpError::invalid_params(format!(
                            "Argument '{}' must be one of: {}",
                            self.name,
                            allowed.join(", ")
                        )));
                    }
                }
            }
            ParamType::Integer => match value.as_u64() {
                None => {
                    return Err(McpError::invalid_params(format!(
                        "Argument '{}' must be a non-negative integer",
                        self.name
                    )));
                }
                Some(n) if n < self.minimum => {
                    return Err(McpError::invalid_params(format!(
                        "Argument '{}' must be at least {}",
                        self.name, self.minimum
                    )));
                }
                Some(_) => {}
            },
        }
        Ok(())
    }
}

/// Static descriptor of an invocable tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// The MCP `tools/list` entry for this tool.
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": {
                "type": "object",
                "properties": properties,
                "required": required,
            },
        })
    }

    /// Validate caller arguments and fill in defaults.
    ///
    /// JSON `null` counts as absent. Unknown keys are passed through.
    pub fn resolve(&self, args: Option<Arguments>) -> Result<Arguments, McpError> {
        let mut args = args.unwrap_or_default();
        args.retain(|_, v| !v.is_null());

        for spec in &self.params {
            match args.get(spec.name) {
                Some(value) => spec.check(value)?,
                None if spec.required => {
                    return Err(McpError::invalid_params(format!(
                        "Missing required argument '{}' for tool {}",
                        spec.name, self.name
                    )));
                }
                None => {
                    if let Some(default) = &spec.default {
                        args.insert(spec.name.to_string(), default.clone());
                    }
                }
            }
        }
        Ok(args)
    }
}

/// Read a string argument that [`ToolDescriptor::resolve`] already checked.
pub(crate) fn str_arg<'a>(args: &'a Arguments, name: &str) -> Result<&'a str, McpError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::invalid_params(format!("Missing argument '{name}'")))
}

pub(crate) fn u64_arg(args: &Arguments, name: &str) -> Option<u64> {
    args.get(name).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmcp_protocol::McpErrorCode;

    fn sample() -> ToolDescriptor {
        ToolDescriptor {
            name: "sample",
            description: "test tool",
            params: vec![
                ParamSpec::required("prompt", ParamType::String, "what to make"),
                ParamSpec::optional("size", ParamType::Integer, "edge")
                    .with_default(json!(8))
                    .with_minimum(1),
                ParamSpec::optional("flavor", ParamType::String, "kind")
                    .with_default(json!("plain"))
                    .with_allowed(&["plain", "spicy"]),
                ParamSpec::optional("seed", ParamType::Integer, "seed"),
            ],
        }
    }

    fn args(v: Value) -> Option<Arguments> {
        v.as_object().cloned()
    }

    #[test]
    fn defaults_are_applied() {
        let resolved = sample().resolve(args(json!({"prompt": "x"}))).unwrap();
        assert_eq!(resolved["size"], 8);
        assert_eq!(resolved["flavor"], "plain");
        assert!(!resolved.contains_key("seed"));
    }

    #[test]
    fn missing_required_is_invalid_params() {
        let err = sample().resolve(None).unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::InvalidParams);
        assert!(err.message.contains("prompt"));
    }

    #[test]
    fn null_counts_as_missing() {
        let err = sample().resolve(args(json!({"prompt": null}))).unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::InvalidParams);
        let ok = sample()
            .resolve(args(json!({"prompt": "x", "size": null})))
            .unwrap();
        assert_eq!(ok["size"], 8);
    }

    #[test]
    fn blank_required_string_rejected() {
        assert!(sample().resolve(args(json!({"prompt": "   "}))).is_err());
    }

    #[test]
    fn wrong_types_rejected() {
        assert!(sample().resolve(args(json!({"prompt": 5}))).is_err());
        assert!(sample().resolve(args(json!({"prompt": "x", "size": "big"}))).is_err());
        assert!(sample().resolve(args(json!({"prompt": "x", "size": -1}))).is_err());
    }

    #[test]
    fn integer_minimum_is_advertised_and_enforced() {
        let json = sample().to_json();
        assert_eq!(json["inputSchema"]["properties"]["size"]["minimum"], 1);
        assert_eq!(json["inputSchema"]["properties"]["seed"]["minimum"], 0);

        let err = sample()
            .resolve(args(json!({"prompt": "x", "size": 0})))
            .unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::InvalidParams);
        assert!(err.message.contains("at least 1"));
        assert!(sample().resolve(args(json!({"prompt": "x", "seed": 0}))).is_ok());
    }

    #[test]
    fn enum_enforced() {
        let err = sample()
            .resolve(args(json!({"prompt": "x", "flavor": "sweet"})))
            .unwrap_err();
        assert!(err.message.contains("plain, spicy"));
    }

    #[test]
    fn schema_lists_required_and_defaults() {
        let json = sample().to_json();
        assert_eq!(json["name"], "sample");
        assert_eq!(json["inputSchema"]["type"], "object");
        assert_eq!(json["inputSchema"]["required"], json!(["prompt"]));
        assert_eq!(json["inputSchema"]["properties"]["size"]["default"], 8);
        assert_eq!(
            json["inputSchema"]["properties"]["flavor"]["enum"],
            json!(["plain", "spicy"])
        );
    }
}
