//! Tool definitions, call requests and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable descriptor of an invocable tool.
///
/// Supplied by the tool registry collaborator; read-only to the orchestrator.
/// `parameters` is a JSON-schema object describing the named parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, unique within a run
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for the tool's parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition with a raw JSON-schema parameter object.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Create a definition from typed parameter descriptors.
    pub fn with_parameters(
        name: impl Into<String>,
        description: impl Into<String>,
        params: &[ToolParameter],
    ) -> Self {
        Self::new(name, description, object_schema(params))
    }

    /// Names the schema marks as required, in schema order.
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Parameter value kinds supported by tool schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl ParameterKind {
    fn schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }
}

/// Typed helper for building a tool's parameter schema.
#[derive(Debug, Clone)]
pub struct ToolParameter {
    /// Parameter name
    pub name: String,
    /// Value kind
    pub kind: ParameterKind,
    /// Human-readable description
    pub description: String,
    /// Whether the parameter must be supplied
    pub required: bool,
    /// Allowed values, if enum-constrained
    pub enum_values: Option<Vec<String>>,
}

impl ToolParameter {
    /// Create a parameter descriptor.
    pub fn new(name: impl Into<String>, kind: ParameterKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            enum_values: None,
        }
    }

    /// Mark the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Constrain the parameter to an enumerated set of values.
    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

fn object_schema(params: &[ToolParameter]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for p in params {
        let mut prop = serde_json::Map::new();
        prop.insert("type".into(), Value::String(p.kind.schema_type().into()));
        prop.insert("description".into(), Value::String(p.description.clone()));
        if let Some(values) = &p.enum_values {
            prop.insert(
                "enum".into(),
                Value::Array(values.iter().cloned().map(Value::String).collect()),
            );
        }
        properties.insert(p.name.clone(), Value::Object(prop));
        if p.required {
            required.push(Value::String(p.name.clone()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// A parsed request to invoke a tool, produced by the model mid-stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Tool name
    pub name: String,
    /// Arguments as a JSON object mapping parameter name to value
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Create a tool-call request.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Deduplication key: tool name plus canonically serialized arguments.
    ///
    /// Object keys are sorted recursively so that two requests differing only
    /// in key order produce the same key. Used to guard against the stream
    /// re-emitting the same call within one run.
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.name, canonical_json(&self.arguments))
    }
}

fn canonical_json(value: &Value) -> String {
    fn canonicalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: std::collections::BTreeMap<_, _> =
                    map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
            other => other.clone(),
        }
    }
    canonicalize(value).to_string()
}

/// Outcome of executing one [`ToolCallRequest`]. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Name of the executed tool
    pub tool_name: String,
    /// Serialized arguments, for display
    pub arguments_text: String,
    /// Normalized result text
    pub content: String,
    /// Whether the execution failed
    pub is_error: bool,
    /// Wall-clock execution duration in milliseconds
    pub duration_ms: u64,
    /// Free-text analysis, populated only by the conductor policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

/// Raw result returned by a tool provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool reported an error
    pub is_error: bool,
    /// Content items of mixed kind
    pub content: Vec<ToolContent>,
}

impl ToolResult {
    /// A successful text-only result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![ToolContent::Text { text: text.into() }],
        }
    }

    /// An error result carrying a message.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![ToolContent::Text { text: text.into() }],
        }
    }
}

/// One content item in a tool result. A closed tagged union keeps the
/// executor's normalization exhaustive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text payload
    Text {
        /// The text
        text: String,
    },
    /// Any non-text payload, serialized to a textual placeholder downstream
    Other {
        /// Item kind reported by the provider (e.g. "image", "resource")
        kind: String,
        /// Raw payload
        data: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_key_ignores_object_key_order() {
        let a = ToolCallRequest::new("get_weather", json!({"city": "Paris", "units": "C"}));
        let b = ToolCallRequest::new("get_weather", json!({"units": "C", "city": "Paris"}));
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn identity_key_distinguishes_name_and_args() {
        let a = ToolCallRequest::new("get_weather", json!({"city": "Paris"}));
        let b = ToolCallRequest::new("get_weather", json!({"city": "Lyon"}));
        let c = ToolCallRequest::new("get_forecast", json!({"city": "Paris"}));
        assert_ne!(a.identity_key(), b.identity_key());
        assert_ne!(a.identity_key(), c.identity_key());
    }

    #[test]
    fn identity_key_sorts_nested_objects() {
        let a = ToolCallRequest::new("q", json!({"filter": {"b": 1, "a": 2}}));
        let b = ToolCallRequest::new("q", json!({"filter": {"a": 2, "b": 1}}));
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn typed_parameters_build_an_object_schema() {
        let def = ToolDefinition::with_parameters(
            "get_weather",
            "Weather lookup",
            &[
                ToolParameter::new("city", ParameterKind::String, "City name").required(),
                ToolParameter::new("units", ParameterKind::String, "Unit system")
                    .with_enum(vec!["metric".into(), "imperial".into()]),
            ],
        );
        assert_eq!(def.parameters["type"], "object");
        assert_eq!(def.parameters["properties"]["city"]["type"], "string");
        assert_eq!(
            def.parameters["properties"]["units"]["enum"],
            json!(["metric", "imperial"])
        );
        assert_eq!(def.required_parameters(), vec!["city"]);
    }

    #[test]
    fn required_parameters_tolerates_missing_section() {
        let def = ToolDefinition::new("t", "d", json!({"type": "object"}));
        assert!(def.required_parameters().is_empty());
    }
}
